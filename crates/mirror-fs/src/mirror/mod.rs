//! One-way mirroring of a file or directory tree
//!
//! A mirror copies `source` into `destination`, preserving permissions,
//! timestamps and symbolic links, and decides whether a file needs copying by
//! comparing content checksums. With pruning enabled, destination entries that
//! have no counterpart in the source are deleted.
//!
//! Directory sources are mirrored as "contents of": the children of `source`
//! land directly under `destination`. A file source lands at
//! `destination/<file name>`.

mod native;
mod rsync;

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use native::NativeMirror;
pub use rsync::RsyncMirror;

/// Options for a single mirror invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorOptions {
    /// Delete destination entries absent from the source.
    pub prune: bool,
    /// Log every transferred or deleted path at `info` level.
    pub verbose: bool,
    /// Top-level destination names that are neither copied nor pruned.
    pub exclude: BTreeSet<OsString>,
}

impl MirrorOptions {
    /// Add/update only, never delete.
    pub fn copy_only() -> Self {
        Self::default()
    }

    /// True mirror: delete destination-only entries.
    pub fn pruning() -> Self {
        Self {
            prune: true,
            ..Self::default()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub(crate) fn is_excluded(&self, name: &std::ffi::OsStr) -> bool {
        self.exclude.contains(name)
    }
}

/// Counters describing what a mirror did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Files, links and directories written to the destination
    pub copied: usize,
    /// Files whose content already matched
    pub unchanged: usize,
    /// Destination entries removed by pruning
    pub deleted: usize,
    /// Source entries skipped because of their file type
    pub skipped: usize,
}

impl MirrorStats {
    /// True when the mirror left the destination untouched.
    pub fn is_noop(&self) -> bool {
        self.copied == 0 && self.deleted == 0
    }
}

/// What kind of filesystem object a mirror source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
    /// Socket, device, FIFO, ...
    Unsupported,
}

impl SourceKind {
    /// Inspect `path`, following symlinks.
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let file_type = fs::metadata(path)?.file_type();
        Ok(if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Unsupported
        })
    }
}

/// Capability to mirror one source into one destination.
///
/// Implementations must be interchangeable: the same inputs produce the same
/// destination tree regardless of engine.
pub trait MirrorCopy: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Mirror `source` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CopyEngine`] when the copy fails. Unsupported
    /// file types are skipped with a warning, not reported as errors.
    fn mirror(
        &self,
        source: &Path,
        destination: &Path,
        options: &MirrorOptions,
    ) -> Result<MirrorStats>;
}

/// Which mirror implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyEngine {
    /// Pure Rust recursive copy
    #[default]
    Native,
    /// External `rsync -ac` invocation
    Rsync,
}

impl CopyEngine {
    /// Build the engine.
    pub fn build(self) -> Box<dyn MirrorCopy> {
        match self {
            CopyEngine::Native => Box::new(NativeMirror::new()),
            CopyEngine::Rsync => Box::new(RsyncMirror::new()),
        }
    }
}

impl std::fmt::Display for CopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CopyEngine::Native => write!(f, "native"),
            CopyEngine::Rsync => write!(f, "rsync"),
        }
    }
}

/// Give directory `destination` the mode and modification time of `source`.
///
/// Engines leave the top-level destination alone, so a caller that mirrors
/// into a scratch directory uses this to carry the source's own metadata
/// over. A file source only lends its modification time; the directory keeps
/// its mode.
pub fn copy_directory_metadata(source: &Path, destination: &Path) -> Result<()> {
    let meta = fs::metadata(source).map_err(|e| Error::copy_engine(source, e.to_string()))?;
    if meta.is_dir() {
        sync_metadata(&meta, destination)
    } else {
        sync_modified(&meta, destination)
    }
}

/// Bring permissions and modification time of `destination` in line with
/// the source metadata, touching only what differs.
pub(crate) fn sync_metadata(source: &Metadata, destination: &Path) -> Result<()> {
    let current = fs::metadata(destination).map_err(|e| Error::copy_engine(destination, e.to_string()))?;

    if current.permissions() != source.permissions() {
        fs::set_permissions(destination, source.permissions())
            .map_err(|e| Error::copy_engine(destination, e.to_string()))?;
    }

    sync_modified(source, destination)
}

fn sync_modified(source: &Metadata, destination: &Path) -> Result<()> {
    let current = fs::metadata(destination).map_err(|e| Error::copy_engine(destination, e.to_string()))?;

    if let (Ok(wanted), Ok(actual)) = (source.modified(), current.modified())
        && wanted != actual
    {
        File::open(destination)
            .and_then(|f| f.set_modified(wanted))
            .map_err(|e| Error::copy_engine(destination, e.to_string()))?;
    }

    Ok(())
}
