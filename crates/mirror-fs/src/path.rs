//! Canonical path resolution
//!
//! Source paths are registry keys, so textually different spellings of the
//! same location (`~/notes`, `/home/me/./notes`, a symlink to it) must all
//! resolve to one canonical absolute path.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Expand a leading `~` to the current user's home directory.
///
/// Only the bare `~` and `~/...` forms are expanded; `~user` is left as is.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let Ok(rest) = path.strip_prefix("~") else {
        return Ok(path.to_path_buf());
    };

    let home = dirs::home_dir().ok_or_else(|| Error::PathResolution {
        path: path.display().to_string(),
        message: "home directory is unknown".into(),
    })?;

    Ok(home.join(rest))
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Symbolic links followed before giving up, as in `SYMLOOP_MAX`
const MAX_LINK_HOPS: usize = 40;

/// Resolve `path` to its canonical absolute form.
///
/// `~` is expanded, relative paths are anchored at the current directory and
/// symlinks are resolved. A path that does not exist (an unmounted drive, a
/// deleted folder) still gets a stable answer: its deepest existing ancestor
/// is canonicalized and the missing tail is appended lexically. A dangling
/// symlink is still followed to where it points, so a link into an unmounted
/// drive keeps the key it had while the drive was present.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let expanded = expand_home(path)?;

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        cwd.join(expanded)
    };

    let mut current = lexical_normalize(&absolute);
    for _ in 0..MAX_LINK_HOPS {
        match resolve_existing(&current) {
            Resolved::Done(resolved) => return Ok(resolved),
            Resolved::Follow(next) => current = next,
        }
    }

    Err(Error::PathResolution {
        path: path.display().to_string(),
        message: "too many levels of symbolic links".into(),
    })
}

enum Resolved {
    Done(PathBuf),
    /// A dangling link was found; resolution restarts at its target
    Follow(PathBuf),
}

fn resolve_existing(path: &Path) -> Resolved {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(resolved) = dunce::canonicalize(existing) {
            return Resolved::Done(with_tail(resolved, &missing));
        }
        if let Ok(target) = fs::read_link(existing) {
            let base = existing.parent().unwrap_or(existing);
            return Resolved::Follow(lexical_normalize(&with_tail(base.join(target), &missing)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Resolved::Done(path.to_path_buf()),
        }
    }
}

/// Append the collected missing components, innermost last.
fn with_tail(mut base: PathBuf, missing: &[OsString]) -> PathBuf {
    for part in missing.iter().rev() {
        base.push(part);
    }
    base
}
