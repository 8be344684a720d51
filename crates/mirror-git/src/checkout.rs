//! libgit2-backed local checkout

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    DiffFindOptions, ErrorCode, FetchOptions, IndexAddOption, PushOptions, Repository, ResetType,
    Signature,
};

use crate::categories::{CategorySet, classify};
use crate::credentials::Remote;
use crate::store::{ResetOutcome, VersionedStore};
use crate::{Error, Result};

/// Name of the remote every checkout tracks
pub const REMOTE_NAME: &str = "origin";

/// Ref holding commit annotations
pub const NOTES_REF: &str = "refs/notes/commits";

const FALLBACK_NAME: &str = "mirror-sync";
const FALLBACK_EMAIL: &str = "mirror-sync@localhost";

/// A working copy of the remote repository.
pub struct GitCheckout {
    repo: Repository,
    remote: Remote,
    workdir: PathBuf,
    branch: String,
}

impl std::fmt::Debug for GitCheckout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCheckout")
            .field("workdir", &self.workdir)
            .field("remote", &self.remote)
            .field("branch", &self.branch)
            .finish()
    }
}

impl GitCheckout {
    /// Clone `remote` into `path` when nothing is there yet, otherwise open
    /// the existing checkout.
    ///
    /// `branch` overrides the branch checked out by the clone.
    pub fn open_or_clone(remote: Remote, path: &Path, branch: Option<&str>) -> Result<Self> {
        let repo = if path.join(".git").exists() {
            tracing::debug!(path = %path.display(), "Opening existing checkout");
            let repo = Repository::open(path)?;
            repo.remote_set_url(REMOTE_NAME, remote.url())?;
            repo
        } else {
            tracing::info!(remote = %remote, path = %path.display(), "Cloning remote");
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| mirror_fs::Error::io(parent, e))?;
            }
            let mut fetch = FetchOptions::new();
            fetch.remote_callbacks(remote.callbacks());
            RepoBuilder::new()
                .fetch_options(fetch)
                .clone(remote.url(), path)
                .map_err(|e| Error::unreachable("clone", e))?
        };

        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::BareCheckout {
                path: path.to_path_buf(),
            })?;

        let branch = match branch {
            Some(name) => name.to_string(),
            None => head_branch(&repo).ok_or_else(|| Error::DetachedHead {
                path: workdir.clone(),
            })?,
        };

        Ok(Self {
            repo,
            remote,
            workdir,
            branch,
        })
    }

    fn fetch(&self, refspecs: &[&str], operation: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(REMOTE_NAME)
            .map_err(|_| Error::RemoteNotFound {
                name: REMOTE_NAME.to_string(),
            })?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.remote.callbacks());
        remote
            .fetch(refspecs, Some(&mut options), None)
            .map_err(|e| Error::unreachable(operation, e))
    }

    fn push_refspec(&self, refspec: &str, operation: &str) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(REMOTE_NAME)
            .map_err(|_| Error::RemoteNotFound {
                name: REMOTE_NAME.to_string(),
            })?;
        let mut options = PushOptions::new();
        options.remote_callbacks(self.remote.callbacks());
        remote
            .push(&[refspec], Some(&mut options))
            .map_err(|e| Error::unreachable(operation, e))
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(signature) => Ok(signature),
            Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }
}

impl VersionedStore for GitCheckout {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn branch(&self) -> &str {
        &self.branch
    }

    fn reset_to_remote(&mut self) -> Result<ResetOutcome> {
        let tracking = format!("refs/remotes/{REMOTE_NAME}/{}", self.branch);
        let refspec = format!("+refs/heads/{}:{tracking}", self.branch);
        self.fetch(&[&refspec], "fetch")?;

        let local = format!("refs/heads/{}", self.branch);
        let remote_ref = match self.repo.find_reference(&tracking) {
            Ok(reference) => reference,
            Err(e) if e.code() == ErrorCode::NotFound => {
                tracing::info!(branch = %self.branch, "Remote branch does not exist yet");
                // First commit must land on the configured branch
                self.repo.set_head(&local)?;
                return Ok(ResetOutcome::RemoteEmpty);
            }
            Err(e) => return Err(e.into()),
        };
        let commit = remote_ref.peel_to_commit()?;

        self.repo
            .reference(&local, commit.id(), true, "mirror-sync: reset to remote")?;
        self.repo.set_head(&local)?;
        self.repo.reset(
            commit.as_object(),
            ResetType::Hard,
            Some(CheckoutBuilder::new().force()),
        )?;

        Ok(ResetOutcome::Reset {
            commit: commit.id().to_string(),
        })
    }

    fn stage_all(&mut self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn staged_categories(&self) -> Result<CategorySet> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if is_unborn(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let index = self.repo.index()?;

        let mut diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), None)?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find))?;

        Ok(classify(&diff))
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        let signature = self.signature()?;
        let mut index = self.repo.index()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if is_unborn(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<_> = parent.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        Ok(oid.to_string())
    }

    fn push(&mut self) -> Result<()> {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);
        self.push_refspec(&refspec, "push")
    }

    fn fetch_annotations(&mut self) -> Result<()> {
        self.fetch(&["+refs/notes/*:refs/notes/*"], "notes fetch")
    }

    fn annotate(&mut self, commit: &str, text: &str) -> Result<()> {
        let signature = self.signature()?;
        let oid = git2::Oid::from_str(commit)?;
        self.repo
            .note(&signature, &signature, Some(NOTES_REF), oid, text, true)?;
        Ok(())
    }

    fn push_annotations(&mut self) -> Result<()> {
        self.push_refspec(&format!("{NOTES_REF}:{NOTES_REF}"), "notes push")
    }
}

/// Branch HEAD points at, even when it has no commits yet.
fn head_branch(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    let target = head.symbolic_target()?;
    target.strip_prefix("refs/heads/").map(str::to_string)
}

fn is_unborn(error: &git2::Error) -> bool {
    matches!(error.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}
