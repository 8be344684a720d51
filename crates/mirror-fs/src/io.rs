//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Temp file lives next to the target so the rename stays on one filesystem
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Give the owner write access to directory `path` if it lacks it.
///
/// Returns the permissions the directory had before, when they were changed,
/// so the caller can put them back once done writing.
pub fn ensure_owner_writable(path: &Path) -> Result<Option<fs::Permissions>> {
    let original = fs::metadata(path).map_err(|e| Error::io(path, e))?.permissions();
    let Some(writable) = owner_writable(&original) else {
        return Ok(None);
    };
    fs::set_permissions(path, writable).map_err(|e| Error::io(path, e))?;
    Ok(Some(original))
}

#[cfg(unix)]
fn owner_writable(permissions: &fs::Permissions) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    let mode = permissions.mode();
    (mode & 0o700 != 0o700).then(|| fs::Permissions::from_mode(mode | 0o700))
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn owner_writable(permissions: &fs::Permissions) -> Option<fs::Permissions> {
    permissions.readonly().then(|| {
        let mut writable = permissions.clone();
        writable.set_readonly(false);
        writable
    })
}

/// Remove a file, symlink or whole directory tree, including directories
/// the owner cannot write to.
pub fn remove_tree(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    if !meta.is_dir() {
        return fs::remove_file(path).map_err(|e| Error::io(path, e));
    }
    unlock_dirs(path)?;
    fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
}

fn unlock_dirs(dir: &Path) -> Result<()> {
    ensure_owner_writable(dir)?;
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.file_type().map_err(|e| Error::io(dir, e))?.is_dir() {
            unlock_dirs(&entry.path())?;
        }
    }
    Ok(())
}

/// An exclusive advisory lock held on a file for as long as the guard lives.
///
/// Used to keep two sync cycles from running against the same checkout.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to take the lock without blocking.
    ///
    /// Fails with [`Error::LockFailed`] when another process holds it.
    pub fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        file.try_lock_exclusive().map_err(|_| Error::LockFailed {
            path: path.to_path_buf(),
        })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock");
        }
    }
}
