//! User configuration
//!
//! ```yaml
//! credentials:
//!   method: ssh
//!   username: octo
//!   repo: backup
//! path_install: ~/.local/share/mirror-sync
//! paths_sync:
//!   - ~/Documents
//!   - ~/.bashrc
//! ```

use std::path::{Path, PathBuf};

use mirror_fs::{ConfigStore, CopyEngine};
use mirror_git::{AuthMethod, Credentials, Remote};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Everything one sync cycle needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub credentials: Credentials,

    /// Local root that checkouts are created under
    pub path_install: PathBuf,

    /// Files and directories to keep mirrored
    #[serde(default)]
    pub paths_sync: Vec<PathBuf>,

    /// Give every machine its own replica and registry inside the repository
    #[serde(default = "default_true")]
    pub namespace_by_machine: bool,

    #[serde(default)]
    pub copy_engine: CopyEngine,

    /// Branch to commit to, the remote's default branch when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Parent directory for the staging area, the system temp dir when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() && !path.starts_with("~") {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

impl SyncConfig {
    /// Load the configuration from `path`, format chosen by extension.
    ///
    /// Relative paths in the file are taken relative to the file's own
    /// directory, so the result does not depend on where the process runs.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::configuration(format!(
                "configuration file not found at {}",
                path.display()
            )));
        }
        let mut config: Self = ConfigStore::new().load(path).map_err(|e| match e {
            mirror_fs::Error::ConfigParse { message, .. } => {
                Error::configuration(format!("{}: {message}", path.display()))
            }
            other => other.into(),
        })?;

        let base = mirror_fs::canonicalize(path.parent().unwrap_or(Path::new("")))?;
        config.anchor_relative_paths(&base);
        Ok(config)
    }

    /// Join every relative path onto `base`. `~` paths are left for home
    /// expansion.
    pub fn anchor_relative_paths(&mut self, base: &Path) {
        self.path_install = anchor(base, &self.path_install);
        for path in &mut self.paths_sync {
            *path = anchor(base, path);
        }
        if let Some(dir) = &mut self.staging_dir {
            *dir = anchor(base, dir);
        }
    }

    /// Pre-flight checks run before any filesystem or network side effect.
    pub fn validate(&self) -> Result<AuthMethod> {
        let method = self
            .credentials
            .validate()
            .map_err(|e| Error::configuration(e.to_string()))?;

        if self.path_install.as_os_str().is_empty() {
            return Err(Error::configuration("path_install must not be empty"));
        }
        if self.branch.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(Error::configuration("branch must not be empty when given"));
        }

        Ok(method)
    }

    /// Remote described by the credentials.
    pub fn remote(&self) -> Result<Remote> {
        Remote::from_credentials(&self.credentials).map_err(|e| Error::configuration(e.to_string()))
    }

    /// Canonical install root.
    pub fn install_root(&self) -> Result<PathBuf> {
        Ok(mirror_fs::canonicalize(&self.path_install)?)
    }

    /// Canonical staging parent, if configured.
    pub fn staging_root(&self) -> Result<Option<PathBuf>> {
        self.staging_dir
            .as_ref()
            .map(|dir| mirror_fs::canonicalize(dir).map_err(Error::from))
            .transpose()
    }
}
