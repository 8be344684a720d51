//! Filesystem layer for mirror-sync
//!
//! Provides canonical path resolution, safe I/O, content checksums and the
//! mirror engines that replicate sources into the repository.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod mirror;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::FileLock;
pub use mirror::{
    CopyEngine, MirrorCopy, MirrorOptions, MirrorStats, NativeMirror, RsyncMirror, SourceKind,
    copy_directory_metadata,
};
pub use path::canonicalize;
