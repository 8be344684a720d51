//! Where things live on disk
//!
//! ```text
//! {path_install}/
//!   .mirror-sync.lock
//!   {sha256(username_repo)}/{repo}/     checkout
//!     data/[{machine}/]                 replica, one subdirectory per slot
//!     links.yml | links/{machine}.yml   link registry
//! ```

use std::path::{Path, PathBuf};

use mirror_git::Credentials;
use sha2::{Digest, Sha256};

use crate::machine::MachineIdentity;

/// Lock file guarding a cycle, relative to the install root
pub const LOCK_FILE_NAME: &str = ".mirror-sync.lock";

const REPLICA_DIR: &str = "data";
const REGISTRY_FILE: &str = "links.yml";
const REGISTRY_DIR: &str = "links";

/// Path of the cycle lock under `install_root`.
pub fn lock_path(install_root: &Path) -> PathBuf {
    install_root.join(LOCK_FILE_NAME)
}

/// Checkout directory for a remote, unique per username/repository pair.
pub fn checkout_dir(install_root: &Path, credentials: &Credentials) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", credentials.username, credentials.repo).as_bytes());
    install_root
        .join(format!("{:x}", hasher.finalize()))
        .join(&credentials.repo)
}

/// Replica and registry locations inside a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLayout {
    root: PathBuf,
    machine: Option<MachineIdentity>,
}

impl CheckoutLayout {
    /// Layout of the checkout at `root`, namespaced by `machine` when given.
    pub fn new(root: impl Into<PathBuf>, machine: Option<MachineIdentity>) -> Self {
        Self {
            root: root.into(),
            machine,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn machine(&self) -> Option<&MachineIdentity> {
        self.machine.as_ref()
    }

    /// Directory holding one subdirectory per slot.
    pub fn replica_dir(&self) -> PathBuf {
        let base = self.root.join(REPLICA_DIR);
        match &self.machine {
            Some(machine) => base.join(machine.as_str()),
            None => base,
        }
    }

    /// Registry document, outside the replica so pruning never touches it.
    pub fn registry_path(&self) -> PathBuf {
        match &self.machine {
            Some(machine) => self
                .root
                .join(REGISTRY_DIR)
                .join(format!("{}.yml", machine.as_str())),
            None => self.root.join(REGISTRY_FILE),
        }
    }
}
