//! Version-control capability used by the synchronizer

use std::path::Path;

use crate::Result;
use crate::categories::CategorySet;

/// Result of resetting a checkout to its remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The branch now points at this remote commit
    Reset { commit: String },
    /// The remote has no such branch yet (empty repository)
    RemoteEmpty,
}

/// Trait for the version-controlled store a replica lives in.
///
/// The remote is the single source of truth: a cycle resets to it, stages
/// everything, commits, pushes, and annotates the commit with its change
/// categories. Any backend (libgit2, a `git` subprocess) must behave the
/// same way.
pub trait VersionedStore {
    /// Root of the working tree
    fn workdir(&self) -> &Path;

    /// Branch the store commits to
    fn branch(&self) -> &str;

    /// Fetch the branch and hard-reset to the remote tracking branch,
    /// discarding unpushed local commits.
    fn reset_to_remote(&mut self) -> Result<ResetOutcome>;

    /// Add untracked files and all modifications (including deletions) of
    /// tracked files to the index.
    fn stage_all(&mut self) -> Result<()>;

    /// Categories of the staged changes relative to the last commit.
    ///
    /// Empty when the index matches the last commit.
    fn staged_categories(&self) -> Result<CategorySet>;

    /// Commit the index, returning the new commit id.
    fn commit(&mut self, message: &str) -> Result<String>;

    /// Push the branch to the remote.
    fn push(&mut self) -> Result<()>;

    /// Fetch annotation refs so concurrent notes from other machines survive.
    fn fetch_annotations(&mut self) -> Result<()>;

    /// Attach `text` to `commit`, replacing an existing annotation.
    fn annotate(&mut self, commit: &str, text: &str) -> Result<()>;

    /// Push the annotation ref.
    fn push_annotations(&mut self) -> Result<()>;
}
