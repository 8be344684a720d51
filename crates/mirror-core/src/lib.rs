//! Synchronization engine for mirror-sync
//!
//! Keeps a set of local files and directories mirrored into a git
//! repository:
//!
//! - **Link registry**: durable source path → slot mapping
//! - **Bulk replace**: staging pass plus one pruning mirror into the replica
//! - **Synchronizer**: reset to remote, mirror, stage, commit, push, annotate
//!
//! # Architecture
//!
//! ```text
//!        mirror-cli
//!            |
//!       mirror-core
//!        /       \
//!  mirror-fs   mirror-git
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod layout;
pub mod machine;
pub mod registry;
pub mod replace;

pub use config::{DEFAULT_CONFIG_FILE, SyncConfig};
pub use engine::{CycleOutcome, CycleReport, Synchronizer, commit_message};
pub use error::{Error, Result};
pub use layout::{CheckoutLayout, LOCK_FILE_NAME, checkout_dir, lock_path};
pub use machine::MachineIdentity;
pub use registry::{LinkEntry, LinkRegistry, MAX_SLOT_ATTEMPTS, SlotNamer, UuidNamer};
pub use replace::{BulkReplaceCoordinator, ReplaceReport, SkipReason, SkippedSource};
