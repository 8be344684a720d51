//! Stable per-host identifier

use std::fmt;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{Error, Result};

const MACHINE_ID_FILES: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Hashed host identifier used to namespace a machine's slots when several
/// machines share one remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineIdentity(String);

impl MachineIdentity {
    /// Identify the current host from the systemd/dbus machine id.
    pub fn detect() -> Result<Self> {
        let candidates = MACHINE_ID_FILES.map(Path::new);
        Self::from_files(&candidates)
    }

    /// Identify the host from the first readable, non-empty id file.
    pub fn from_files(candidates: &[&Path]) -> Result<Self> {
        for path in candidates {
            match fs::read_to_string(path) {
                Ok(raw) if !raw.trim().is_empty() => {
                    tracing::debug!(path = %path.display(), "Read machine id");
                    return Ok(Self::from_raw(&raw));
                }
                Ok(_) => tracing::debug!(path = %path.display(), "Machine id file is empty"),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "No machine id"),
            }
        }
        Err(Error::configuration(
            "cannot determine machine id; set namespace_by_machine: false",
        ))
    }

    /// Hash a raw machine id.
    pub fn from_raw(raw: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw.trim().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
