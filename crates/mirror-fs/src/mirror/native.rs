//! Pure Rust mirror engine

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;

use super::{MirrorCopy, MirrorOptions, MirrorStats, SourceKind, sync_metadata};
use crate::checksum::same_content;
use crate::{Error, Result};

/// Recursive copy with checksum comparison and optional pruning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeMirror;

impl NativeMirror {
    pub fn new() -> Self {
        Self
    }

    fn mirror_dir(
        &self,
        source: &Path,
        destination: &Path,
        options: &MirrorOptions,
        top_level: bool,
        stats: &mut MirrorStats,
    ) -> Result<()> {
        let mut seen: BTreeSet<OsString> = BTreeSet::new();

        for (name, src_path) in sorted_entries(source)? {
            if top_level && options.is_excluded(&name) {
                continue;
            }
            let dst_path = destination.join(&name);
            seen.insert(name);

            let meta = fs::symlink_metadata(&src_path).map_err(engine_err(&src_path))?;
            let file_type = meta.file_type();

            if file_type.is_symlink() {
                mirror_symlink(&src_path, &dst_path, options, stats)?;
            } else if file_type.is_dir() {
                prepare_dir(&dst_path, options, stats)?;
                // A read-only source mode is applied only once the children are written
                crate::io::ensure_owner_writable(&dst_path)?;
                self.mirror_dir(&src_path, &dst_path, options, false, stats)?;
                sync_metadata(&meta, &dst_path)?;
            } else if file_type.is_file() {
                mirror_file(&src_path, &meta, &dst_path, options, stats)?;
            } else {
                tracing::warn!(path = %src_path.display(), "Not a file or directory, skipping");
                stats.skipped += 1;
            }
        }

        if options.prune {
            for (name, dst_path) in sorted_entries(destination)? {
                if seen.contains(&name) || (top_level && options.is_excluded(&name)) {
                    continue;
                }
                remove_entry(&dst_path)?;
                report(options, "deleted", &dst_path);
                stats.deleted += 1;
            }
        }

        Ok(())
    }
}

impl MirrorCopy for NativeMirror {
    fn name(&self) -> &'static str {
        "native"
    }

    fn mirror(
        &self,
        source: &Path,
        destination: &Path,
        options: &MirrorOptions,
    ) -> Result<MirrorStats> {
        let mut stats = MirrorStats::default();
        let kind = SourceKind::of(source).map_err(engine_err(source))?;

        // The destination directory belongs to the caller: its own mode and
        // timestamps are left alone, only its children are mirrored
        let written = match kind {
            SourceKind::Directory => with_writable_dir(destination, || {
                self.mirror_dir(source, destination, options, true, &mut stats)
            }),
            SourceKind::File => {
                let name = source
                    .file_name()
                    .ok_or_else(|| Error::copy_engine(source, "file source has no name"))?;
                let meta = fs::metadata(source).map_err(engine_err(source))?;
                with_writable_dir(destination, || {
                    mirror_file(source, &meta, &destination.join(name), options, &mut stats)
                })
            }
            SourceKind::Unsupported => {
                tracing::warn!(path = %source.display(), "Not a file or directory, skipping");
                stats.skipped += 1;
                Ok(())
            }
        };

        written.map(|()| stats)
    }
}

/// Run `write` with `dir` created and owner-writable, then restore its mode.
fn with_writable_dir(dir: &Path, write: impl FnOnce() -> Result<()>) -> Result<()> {
    fs::create_dir_all(dir).map_err(engine_err(dir))?;
    let original = crate::io::ensure_owner_writable(dir)?;
    let written = write();
    if let Some(permissions) = original {
        fs::set_permissions(dir, permissions).map_err(engine_err(dir))?;
    }
    written
}

fn engine_err(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |e| Error::copy_engine(path, e.to_string())
}

fn report(options: &MirrorOptions, action: &str, path: &Path) {
    if options.verbose {
        tracing::info!(path = %path.display(), "{action}");
    } else {
        tracing::debug!(path = %path.display(), "{action}");
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<(OsString, std::path::PathBuf)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(engine_err(dir))? {
        let entry = entry.map_err(engine_err(dir))?;
        entries.push((entry.file_name(), entry.path()));
    }
    entries.sort();
    Ok(entries)
}

fn remove_entry(path: &Path) -> Result<()> {
    crate::io::remove_tree(path).map_err(|e| Error::copy_engine(path, e.to_string()))
}

/// Make sure `path` is a real directory, replacing whatever else sits there.
fn prepare_dir(path: &Path, options: &MirrorOptions, stats: &mut MirrorStats) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => remove_entry(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::copy_engine(path, e.to_string())),
    }
    fs::create_dir(path).map_err(engine_err(path))?;
    report(options, "created", path);
    stats.copied += 1;
    Ok(())
}

fn mirror_file(
    source: &Path,
    meta: &Metadata,
    destination: &Path,
    options: &MirrorOptions,
    stats: &mut MirrorStats,
) -> Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(existing) if existing.is_file() => {
            if same_content(source, destination).map_err(engine_err(source))? {
                sync_metadata(meta, destination)?;
                stats.unchanged += 1;
                return Ok(());
            }
        }
        Ok(_) => remove_entry(destination)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::copy_engine(destination, e.to_string())),
    }

    // Copy beside the target, then rename over it, so a read-only or
    // half-written destination never blocks the update
    let parent = destination
        .parent()
        .ok_or_else(|| Error::copy_engine(destination, "destination has no parent"))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".mirror-")
        .tempfile_in(parent)
        .map_err(engine_err(parent))?;

    let mut reader = File::open(source).map_err(engine_err(source))?;
    io::copy(&mut reader, temp.as_file_mut()).map_err(engine_err(source))?;
    temp.as_file()
        .set_permissions(meta.permissions())
        .map_err(engine_err(destination))?;
    if let Ok(modified) = meta.modified() {
        temp.as_file()
            .set_modified(modified)
            .map_err(engine_err(destination))?;
    }
    temp.persist(destination)
        .map_err(|e| Error::copy_engine(destination, e.error.to_string()))?;

    report(options, "copied", destination);
    stats.copied += 1;
    Ok(())
}

#[cfg(unix)]
fn mirror_symlink(
    source: &Path,
    destination: &Path,
    options: &MirrorOptions,
    stats: &mut MirrorStats,
) -> Result<()> {
    let target = fs::read_link(source).map_err(engine_err(source))?;

    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(destination).ok().as_deref() == Some(target.as_path()) {
                stats.unchanged += 1;
                return Ok(());
            }
            remove_entry(destination)?;
        }
        Ok(_) => remove_entry(destination)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::copy_engine(destination, e.to_string())),
    }

    std::os::unix::fs::symlink(&target, destination).map_err(engine_err(destination))?;
    report(options, "linked", destination);
    stats.copied += 1;
    Ok(())
}

#[cfg(not(unix))]
fn mirror_symlink(
    source: &Path,
    _destination: &Path,
    _options: &MirrorOptions,
    stats: &mut MirrorStats,
) -> Result<()> {
    tracing::warn!(path = %source.display(), "Symbolic links are not mirrored on this platform");
    stats.skipped += 1;
    Ok(())
}
