//! [`TestEnv`] builder for end-to-end sync scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::git;

/// A temporary world holding a bare remote, an install root for checkouts
/// and a directory of source files to back up.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::env::TestEnv;
///
/// let env = TestEnv::seeded();
/// let notes = env.write_source("notes/a.txt", "alpha");
/// let config = env.write_config(&[env.sources().join("notes")]);
/// ```
pub struct TestEnv {
    temp_dir: TempDir,
}

impl TestEnv {
    /// An environment whose remote already has one commit on `main`.
    pub fn seeded() -> Self {
        let env = Self::bare();
        git::seeded_remote(&env.remote());
        env
    }

    /// An environment whose remote has no commits at all.
    pub fn empty() -> Self {
        let env = Self::bare();
        git::empty_remote(&env.remote());
        env
    }

    fn bare() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sources")).unwrap();
        Self { temp_dir }
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the bare remote repository.
    pub fn remote(&self) -> PathBuf {
        self.root().join("remote.git")
    }

    /// Open the bare remote for assertions.
    pub fn remote_repo(&self) -> git2::Repository {
        git2::Repository::open_bare(self.remote()).unwrap()
    }

    /// Directory checkouts are created under.
    pub fn install(&self) -> PathBuf {
        self.root().join("install")
    }

    /// Directory holding source files.
    pub fn sources(&self) -> PathBuf {
        self.root().join("sources")
    }

    /// Write a source file (relative to [`sources`](Self::sources)),
    /// creating parent directories.
    pub fn write_source(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.sources().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `config.yml` pointing at the local remote, with machine
    /// namespacing off so the layout is the same on every host.
    pub fn write_config(&self, paths: &[PathBuf]) -> PathBuf {
        let mut config = format!(
            "credentials:\n  method: ssh\n  username: tester\n  repo: backup\n  url: \"{}\"\n\
             path_install: \"{}\"\nbranch: main\nnamespace_by_machine: false\npaths_sync:\n",
            self.remote().display(),
            self.install().display()
        );
        if paths.is_empty() {
            config = config.replace("paths_sync:\n", "paths_sync: []\n");
        }
        for path in paths {
            config.push_str(&format!("  - \"{}\"\n", path.display()));
        }

        let path = self.root().join("config.yml");
        fs::write(&path, config).unwrap();
        path
    }
}
