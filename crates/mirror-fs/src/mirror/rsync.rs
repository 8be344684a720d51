//! Mirror engine backed by an external `rsync` binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{MirrorCopy, MirrorOptions, MirrorStats, SourceKind};
use crate::{Error, Result};

/// Runs `rsync -ac [--delete]` for each mirror.
///
/// `-a` preserves links, permissions and times and recurses; `-c` compares
/// checksums instead of size and modification time.
#[derive(Debug, Clone)]
pub struct RsyncMirror {
    binary: PathBuf,
}

impl Default for RsyncMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl RsyncMirror {
    /// Use `rsync` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("rsync"),
        }
    }

    /// Use a specific rsync binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Build the argument list for one invocation.
    pub fn arguments(
        &self,
        source: &Path,
        destination: &Path,
        kind: SourceKind,
        options: &MirrorOptions,
    ) -> Vec<String> {
        let mut args = vec![if options.verbose { "-acv" } else { "-ac" }.to_string()];

        if options.prune {
            args.push("--delete".into());
        }
        for name in &options.exclude {
            args.push(format!("--exclude=/{}", name.to_string_lossy()));
        }

        // A trailing slash on the source copies its contents, not the directory itself
        let mut src = source.to_string_lossy().into_owned();
        if kind == SourceKind::Directory && !src.ends_with('/') {
            src.push('/');
        }
        let mut dst = destination.to_string_lossy().into_owned();
        if !dst.ends_with('/') {
            dst.push('/');
        }

        args.push(src);
        args.push(dst);
        args
    }
}

impl MirrorCopy for RsyncMirror {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn mirror(
        &self,
        source: &Path,
        destination: &Path,
        options: &MirrorOptions,
    ) -> Result<MirrorStats> {
        let kind =
            SourceKind::of(source).map_err(|e| Error::copy_engine(source, e.to_string()))?;

        if kind == SourceKind::Unsupported {
            tracing::warn!(path = %source.display(), "Not a file or directory, skipping");
            return Ok(MirrorStats {
                skipped: 1,
                ..MirrorStats::default()
            });
        }

        fs::create_dir_all(destination).map_err(|e| Error::io(destination, e))?;

        let args = self.arguments(source, destination, kind, options);
        tracing::debug!(binary = %self.binary.display(), ?args, "Running rsync");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| Error::copy_engine(source, format!("failed to start rsync: {e}")))?;

        if options.verbose {
            for line in String::from_utf8_lossy(&output.stdout).lines() {
                tracing::info!("{line}");
            }
        }

        if !output.status.success() {
            return Err(Error::copy_engine(
                source,
                format!(
                    "rsync exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        // rsync does not report per-file counts without parsing its output
        Ok(MirrorStats::default())
    }
}
