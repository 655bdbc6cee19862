//! Atomic output writer and site rendering.
//!
//! ## `atomic_write` protocol
//!
//! 1. Render content (already done by caller).
//! 2. SHA-256 hash the content.
//! 3. Hash the file currently at the target path, if any.
//! 4. Identical → skip, leaving mtime untouched.
//! 5. Write to `<path>.sitepush.tmp`.
//! 6. Rename to final path (atomic on POSIX).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;

use sitepush_core::{SiteConfig, SiteName};
use sitepush_renderer::{Renderer, SourceKind, TemplateContext};

use crate::digest::{digest, digest_file};
use crate::error::{io_err, SyncError};
use crate::staleness::{dependency_bound, needs_render, output_file};

/// Suffix of in-flight temp files; never part of a manifest.
pub const TMP_SUFFIX: &str = ".sitepush.tmp";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped: the rendered content matches what is on disk.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// write_atomic / atomic_write
// ---------------------------------------------------------------------------

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()))
}

/// Unconditionally replace `path` with `bytes` via a sibling temp file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    write_atomic_with_tmp(path, bytes, &tmp_path(path))
}

fn write_atomic_with_tmp(path: &Path, bytes: &[u8], tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, bytes).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Hash-gated atomic write of one output file.
pub fn atomic_write(path: &Path, content: &[u8], dry_run: bool) -> Result<WriteResult, SyncError> {
    if path.is_file() && digest_file(path)? == digest(content) {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    write_atomic(path, content)?;
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// render_site
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Re-render every file, stale or not.
    pub force: bool,
    pub dry_run: bool,
    /// Outputs older than this are stale (usually the config file's mtime).
    pub config_mtime: Option<SystemTime>,
}

/// Outcome of rendering one site.
#[derive(Debug)]
pub struct RenderSiteResult {
    pub site: SiteName,
    pub writes: Vec<WriteResult>,
    /// Outputs skipped without rendering because they were up to date.
    pub fresh: usize,
}

impl RenderSiteResult {
    pub fn written(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| !matches!(w, WriteResult::Unchanged { .. }))
            .count()
    }
}

/// Render every emitted file of `site` into its output tree.
///
/// The first render or I/O error aborts the site: a half-rendered tree must
/// never reach the manifest.
pub fn render_site(
    site: &SiteConfig,
    renderer: &Renderer,
    options: &RenderOptions,
) -> Result<RenderSiteResult, SyncError> {
    let ctx = TemplateContext::for_site(site, Utc::now());
    let mut writes = Vec::new();
    let mut fresh = 0;

    for file in renderer.files() {
        let target = output_file(&site.output, &file.output);
        let bound = dependency_bound(file, renderer, options.config_mtime);
        if !options.force && !needs_render(&file.source, &target, bound)? {
            tracing::debug!("fresh: {}", target.display());
            fresh += 1;
            continue;
        }
        let content = match &file.kind {
            SourceKind::Template { name } => renderer
                .render(name, &ctx.for_page(&file.output))?
                .into_bytes(),
            SourceKind::Asset => {
                std::fs::read(&file.source).map_err(|e| io_err(&file.source, e))?
            }
        };
        writes.push(atomic_write(&target, &content, options.dry_run)?);
    }

    Ok(RenderSiteResult {
        site: site.name.clone(),
        writes,
        fresh,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_content(path: &Path, content: &str) -> WriteResult {
        atomic_write(path, content.as_bytes(), false).unwrap()
    }

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.html");
        let result = write_content(&path, "hello");
        assert!(matches!(result, WriteResult::Written { .. }));
        assert!(path.exists());
    }

    #[test]
    fn second_write_same_content_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file.html");
        write_content(&path, "same content");
        let result = write_content(&path, "same content");
        assert!(matches!(result, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn changed_content_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file.html");
        write_content(&path, "v1");
        let result = write_content(&path, "v2");
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    }

    #[test]
    fn dry_run_does_not_write_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.html");
        let result = atomic_write(&path, b"content", true).unwrap();
        assert!(matches!(result, WriteResult::WouldWrite { .. }));
        assert!(!path.exists(), "dry-run must not create files");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.html");
        write_content(&path, "data");
        assert!(!tmp_path(&path).exists(), "temp file must be renamed away");
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blog").join("2026").join("post.html");
        write_content(&path, "content");
        assert!(path.exists());
    }

    #[test]
    fn unchanged_write_preserves_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stable.html");
        write_content(&path, "stable");
        let mtime_1 = fs::metadata(&path).unwrap().modified().unwrap();

        sleep(Duration::from_millis(1100));
        write_content(&path, "stable");
        let mtime_2 = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime_2, mtime_1, "mtime changed; file was rewritten");
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("file.html");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp = tmp_dir.path().join("file.html.sitepush.tmp");

        let result = write_atomic_with_tmp(&path, b"new content", &tmp);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Root can rename into a read-only directory; nothing to check then.
        if result.is_ok() {
            return;
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert!(!tmp.exists(), "temp file should be cleaned up");
    }
}
