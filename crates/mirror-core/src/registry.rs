//! Durable mapping from source paths to replica slots
//!
//! Every configured source is mirrored into its own slot, a directory
//! directly under the replica root. A slot is assigned once, when the source
//! is first seen, and never changes for the lifetime of the link. Sources are
//! canonicalized before lookup, so `~/notes`, `/home/me/notes/` and a
//! symlink to it all hit the same entry.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use mirror_fs::ConfigStore;
use uuid::Uuid;

use crate::{Error, Result};

/// Slot generation attempts before giving up on a source.
pub const MAX_SLOT_ATTEMPTS: usize = 16;

const ROOT_STEM: &str = "root";

/// One source and the slot it is mirrored into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// Canonical absolute source path
    pub source: PathBuf,
    /// Slot directory, relative to the replica root
    pub slot: PathBuf,
}

/// Produces the random part of new slot names.
pub trait SlotNamer: Send {
    fn suffix(&mut self) -> String;
}

/// 122 random bits from a v4 UUID, as 32 hex digits.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNamer;

impl SlotNamer for UuidNamer {
    fn suffix(&mut self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// The source → slot mapping, loaded from and persisted to a YAML document.
pub struct LinkRegistry {
    path: PathBuf,
    links: BTreeMap<PathBuf, PathBuf>,
    namer: Box<dyn SlotNamer>,
    dirty: bool,
}

impl fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkRegistry")
            .field("path", &self.path)
            .field("links", &self.links)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl LinkRegistry {
    /// Load the registry stored at `path`.
    ///
    /// A missing document yields an empty registry.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let links = if path.is_file() {
            ConfigStore::new().load(&path)?
        } else {
            tracing::debug!(path = %path.display(), "No link registry yet");
            BTreeMap::new()
        };

        Ok(Self {
            path,
            links,
            namer: Box::new(UuidNamer),
            dirty: false,
        })
    }

    /// Replace the slot-name generator.
    pub fn with_namer(mut self, namer: impl SlotNamer + 'static) -> Self {
        self.namer = Box::new(namer);
        self
    }

    /// Write the full mapping back to its document.
    pub fn persist(&mut self) -> Result<()> {
        ConfigStore::new().save(&self.path, &self.links)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), links = self.links.len(), "Persisted link registry");
        Ok(())
    }

    /// Slot for `source`, creating one if the source has none yet.
    ///
    /// Canonically equal inputs always return the same slot, including after
    /// a reload from the persisted document.
    pub fn resolve_or_create(&mut self, source: impl AsRef<Path>) -> Result<LinkEntry> {
        let source = mirror_fs::canonicalize(source)?;
        if let Some(slot) = self.links.get(&source) {
            return Ok(LinkEntry {
                source,
                slot: slot.clone(),
            });
        }

        let stem = slot_stem(&source);
        for _ in 0..MAX_SLOT_ATTEMPTS {
            let slot = PathBuf::from(format!("{stem}_{}", self.namer.suffix()));
            if self.links.values().any(|used| *used == slot) {
                tracing::debug!(slot = %slot.display(), "Slot name already taken, retrying");
                continue;
            }

            tracing::info!(source = %source.display(), slot = %slot.display(), "Created link");
            self.links.insert(source.clone(), slot.clone());
            self.dirty = true;
            return Ok(LinkEntry { source, slot });
        }

        Err(Error::SlotExhausted {
            source_path: source,
            attempts: MAX_SLOT_ATTEMPTS,
        })
    }

    /// Existing slot for `source`, without creating one.
    pub fn slot_for(&self, source: impl AsRef<Path>) -> Result<Option<&Path>> {
        let source = mirror_fs::canonicalize(source)?;
        Ok(self.links.get(&source).map(PathBuf::as_path))
    }

    /// Drop entries whose source is no longer among `configured`.
    ///
    /// Returns the removed entries. Their slots disappear from the replica on
    /// the next bulk replace.
    pub fn retain_configured<P: AsRef<Path>>(&mut self, configured: &[P]) -> Result<Vec<LinkEntry>> {
        let keep = configured
            .iter()
            .map(mirror_fs::canonicalize)
            .collect::<mirror_fs::Result<Vec<_>>>()?;

        let mut removed = Vec::new();
        self.links.retain(|source, slot| {
            if keep.contains(source) {
                return true;
            }
            removed.push(LinkEntry {
                source: source.clone(),
                slot: slot.clone(),
            });
            false
        });

        if !removed.is_empty() {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// All links, ordered by source path.
    pub fn entries(&self) -> impl Iterator<Item = LinkEntry> + '_ {
        self.links.iter().map(|(source, slot)| LinkEntry {
            source: source.clone(),
            slot: slot.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// True when the in-memory mapping differs from the persisted one.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn slot_stem(source: &Path) -> String {
    source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| ROOT_STEM.to_string())
}
