//! Applying all links to the replica in one pass
//!
//! Sources are first mirrored (copy-only) into an ephemeral staging
//! directory, one subdirectory per slot. A single pruning mirror then makes
//! the replica match staging. That pruning mirror is the only place slots are
//! ever deleted, and the slots of sources that could not be staged this cycle
//! are excluded from it, so an unmounted drive or a permission error never
//! erases data that was backed up before.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use mirror_fs::{MirrorCopy, MirrorOptions, MirrorStats, SourceKind, copy_directory_metadata};
use tempfile::TempDir;

use crate::registry::{LinkEntry, LinkRegistry};
use crate::Result;

const STAGING_PREFIX: &str = "mirror-staging-";

/// Why a registered source was left out of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source does not exist (or is not reachable) right now
    Missing,
    /// Neither a regular file nor a directory
    Unsupported,
    /// Inspecting or copying the source failed
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing => write!(f, "source missing"),
            SkipReason::Unsupported => write!(f, "unsupported file type"),
            SkipReason::Failed(message) => write!(f, "{message}"),
        }
    }
}

/// A source whose slot was kept untouched this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub entry: LinkEntry,
    pub reason: SkipReason,
}

/// Outcome of [`BulkReplaceCoordinator::replace_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Sources staged and mirrored into their slots
    pub mirrored: Vec<LinkEntry>,
    /// Sources left out, their slots protected from pruning
    pub skipped: Vec<SkippedSource>,
    /// What the final pruning mirror did to the replica
    pub stats: MirrorStats,
}

/// Runs the staging pass and the single pruning mirror into the replica.
pub struct BulkReplaceCoordinator<'a> {
    engine: &'a dyn MirrorCopy,
    staging_parent: Option<PathBuf>,
    verbose: bool,
}

impl<'a> BulkReplaceCoordinator<'a> {
    pub fn new(engine: &'a dyn MirrorCopy) -> Self {
        Self {
            engine,
            staging_parent: None,
            verbose: false,
        }
    }

    /// Create staging directories under `parent` instead of the system temp dir.
    pub fn with_staging_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.staging_parent = parent;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Make `replica_root` hold exactly one up-to-date slot per reachable
    /// registered source, keeping the slots of unreachable ones as they are.
    ///
    /// # Errors
    ///
    /// Fails when the staging directory cannot be created or the final
    /// pruning mirror fails. Problems with individual sources are logged and
    /// reported in [`ReplaceReport::skipped`].
    pub fn replace_all(&self, registry: &LinkRegistry, replica_root: &Path) -> Result<ReplaceReport> {
        let parent = match &self.staging_parent {
            Some(parent) => parent.clone(),
            None => std::env::temp_dir(),
        };
        fs::create_dir_all(&parent).map_err(|e| mirror_fs::Error::io(&parent, e))?;

        // Removed on drop, whichever way this function returns
        let staging = StagingDir::create(&parent)?;

        let mut report = ReplaceReport::default();
        let copy_only = MirrorOptions::copy_only().with_verbose(self.verbose);

        for entry in registry.entries() {
            match self.stage(&entry, staging.path(), &copy_only)? {
                None => report.mirrored.push(entry),
                Some(reason) => {
                    tracing::warn!(
                        source = %entry.source.display(),
                        slot = %entry.slot.display(),
                        reason = %reason,
                        "Skipping source, keeping its slot"
                    );
                    report.skipped.push(SkippedSource { entry, reason });
                }
            }
        }

        fs::create_dir_all(replica_root).map_err(|e| mirror_fs::Error::io(replica_root, e))?;
        let pruning = MirrorOptions::pruning()
            .with_verbose(self.verbose)
            .with_exclude(report.skipped.iter().map(|s| s.entry.slot.as_os_str().to_os_string()));
        report.stats = self.engine.mirror(staging.path(), replica_root, &pruning)?;

        tracing::info!(
            engine = self.engine.name(),
            mirrored = report.mirrored.len(),
            skipped = report.skipped.len(),
            copied = report.stats.copied,
            deleted = report.stats.deleted,
            "Replica updated"
        );

        Ok(report)
    }

    /// Mirror one source into its staging slot, or say why it was skipped.
    fn stage(
        &self,
        entry: &LinkEntry,
        staging: &Path,
        options: &MirrorOptions,
    ) -> Result<Option<SkipReason>> {
        match SourceKind::of(&entry.source) {
            Ok(SourceKind::File | SourceKind::Directory) => {}
            Ok(SourceKind::Unsupported) => return Ok(Some(SkipReason::Unsupported)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Some(SkipReason::Missing)),
            Err(e) => return Ok(Some(SkipReason::Failed(e.to_string()))),
        }

        let slot_dir = staging.join(&entry.slot);
        let staged = self
            .engine
            .mirror(&entry.source, &slot_dir, options)
            .and_then(|_| copy_directory_metadata(&entry.source, &slot_dir));
        match staged {
            Ok(()) => Ok(None),
            Err(e) => {
                // A partial slot must not reach the replica
                if fs::symlink_metadata(&slot_dir).is_ok() {
                    mirror_fs::io::remove_tree(&slot_dir)?;
                }
                Ok(Some(SkipReason::Failed(e.to_string())))
            }
        }
    }
}

/// Scratch directory holding one subdirectory per staged slot.
///
/// Staged slots may carry a read-only source mode, so the tree is made
/// writable before removal. A failed removal is logged, not returned: by then
/// the replica is already up to date.
struct StagingDir(TempDir);

impl StagingDir {
    fn create(parent: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| mirror_fs::Error::io(parent, e))?;
        tracing::debug!(staging = %dir.path().display(), "Created staging directory");
        Ok(Self(dir))
    }

    fn path(&self) -> &Path {
        self.0.path()
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = mirror_fs::io::remove_tree(self.0.path()) {
            tracing::warn!(staging = %self.0.path().display(), error = %e, "Could not remove staging directory");
        }
    }
}
