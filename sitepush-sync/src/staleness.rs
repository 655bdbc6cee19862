//! Render staleness detection.
//!
//! Signal precedence:
//! 1. `NeverRendered` (output tree missing or no emitted file present)
//! 2. `Stale` (some output missing, older than its source, or older than the config)
//! 3. `Current`

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use sitepush_core::SiteConfig;
use sitepush_renderer::{Renderer, SourceFile, SourceKind};

use crate::error::{io_err, SyncError};

/// Render staleness classification for a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StalenessSignal {
    NeverRendered,
    Current,
    Stale { files: Vec<String> },
}

/// Whether `output` must be regenerated from `source`.
///
/// True when the output is missing, older than its source, or older than
/// `bound` (the config file or a partial). A missing source is an error.
pub fn needs_render(
    source: &Path,
    output: &Path,
    bound: Option<SystemTime>,
) -> Result<bool, SyncError> {
    let source_mtime = modified(source)?;
    let output_mtime = match std::fs::metadata(output) {
        Ok(meta) => meta.modified().map_err(|e| io_err(output, e))?,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(io_err(output, err)),
    };
    if output_mtime < source_mtime {
        return Ok(true);
    }
    Ok(bound.is_some_and(|bound| output_mtime < bound))
}

/// Oldest acceptable output mtime for `file` besides its own source.
///
/// Templates also depend on every `_` partial they might pull in.
pub(crate) fn dependency_bound(
    file: &SourceFile,
    renderer: &Renderer,
    config_mtime: Option<SystemTime>,
) -> Option<SystemTime> {
    match file.kind {
        SourceKind::Template { .. } => config_mtime.max(renderer.partials_modified()),
        SourceKind::Asset => config_mtime,
    }
}

/// Check every emitted file of `site` for staleness.
pub fn check(
    site: &SiteConfig,
    renderer: &Renderer,
    config_mtime: Option<SystemTime>,
) -> Result<StalenessSignal, SyncError> {
    let mut stale = Vec::new();
    let mut present = 0usize;
    for file in renderer.files() {
        let output = output_file(&site.output, &file.output);
        if output.exists() {
            present += 1;
        }
        let bound = dependency_bound(file, renderer, config_mtime);
        if needs_render(&file.source, &output, bound)? {
            stale.push(file.output.clone());
        }
    }

    if present == 0 && !renderer.files().is_empty() {
        return Ok(StalenessSignal::NeverRendered);
    }
    if !stale.is_empty() {
        return Ok(StalenessSignal::Stale { files: stale });
    }
    Ok(StalenessSignal::Current)
}

/// Modification time of `path`, with the path attached on failure.
pub fn modified(path: &Path) -> Result<SystemTime, SyncError> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| io_err(path, e))
}

/// Format age from a filesystem timestamp.
pub fn format_system_time_age(timestamp: SystemTime) -> String {
    let age = SystemTime::now()
        .duration_since(timestamp)
        .unwrap_or_default();
    format_duration(age)
}

/// First three entries, then `+N more`.
pub fn preview_files(files: &[String]) -> String {
    let mut shown: Vec<String> = files.iter().take(3).cloned().collect();
    if files.len() > shown.len() {
        shown.push(format!("+{} more", files.len() - shown.len()));
    }
    shown.join(", ")
}

/// `root` joined with a `/`-separated relative path.
pub(crate) fn output_file(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(relative.split('/'));
    path
}

fn format_duration(duration: Duration) -> String {
    format_seconds(duration.as_secs())
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
