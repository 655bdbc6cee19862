//! Local manifest: relative path → content digest for a whole output tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sitepush_core::IgnoreSet;

use crate::digest::{digest_file, format_manifest, MANIFEST_FILE};
use crate::error::{io_err, SyncError};
use crate::writer::{write_atomic, TMP_SUFFIX};

/// Sorted mapping of `/`-separated relative path to hex digest.
///
/// Built fresh every run and only read afterwards; diffing produces a new
/// [`crate::plan::ActionPlan`] rather than editing either manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Manifest::default()
    }

    /// Add or replace an entry, returning the previous digest.
    pub fn insert(&mut self, relative_path: String, digest: String) -> Option<String> {
        self.entries.insert(relative_path, digest)
    }

    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.entries.get(relative_path).map(String::as_str)
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.entries.contains_key(relative_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(relative_path, digest)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }
}

impl FromIterator<(String, String)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Manifest {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ManifestBuilder
// ---------------------------------------------------------------------------

/// Walks an output tree and digests every regular file in it.
///
/// Always skipped: the manifest file itself (by name, at any depth), editor
/// swap files, and leftover atomic-write temp files. Extra patterns come from
/// the site's ignore set.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    root: PathBuf,
    ignore: IgnoreSet,
}

impl ManifestBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ManifestBuilder {
            root: root.into(),
            ignore: IgnoreSet::empty(),
        }
    }

    /// Additional exclusions on top of the built-in ones.
    pub fn ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/digest.sha256`.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Digest the whole tree. Any unreadable directory or file fails the
    /// build: a partial manifest would make the diff lie.
    pub fn build(&self) -> Result<Manifest, SyncError> {
        let mut manifest = Manifest::new();
        self.visit(&self.root, &mut manifest)?;
        tracing::debug!(
            "manifest for {}: {} file(s)",
            self.root.display(),
            manifest.len()
        );
        Ok(manifest)
    }

    /// Overwrite `<root>/digest.sha256` with `manifest`.
    pub fn persist(&self, manifest: &Manifest) -> Result<PathBuf, SyncError> {
        let path = self.manifest_path();
        write_atomic(&path, format_manifest(manifest).as_bytes())?;
        Ok(path)
    }

    /// [`build`](Self::build) then [`persist`](Self::persist).
    pub fn build_and_persist(&self) -> Result<Manifest, SyncError> {
        let manifest = self.build()?;
        self.persist(&manifest)?;
        Ok(manifest)
    }

    fn visit(&self, dir: &Path, manifest: &mut Manifest) -> Result<(), SyncError> {
        let mut entries = std::fs::read_dir(dir)
            .map_err(|e| io_err(dir, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| io_err(dir, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
            if file_type.is_dir() {
                self.visit(&path, manifest)?;
                continue;
            }
            // Symlinked files are digested by target; symlinked directories
            // are not descended, which also rules out cycles.
            let is_file = if file_type.is_symlink() {
                match std::fs::metadata(&path) {
                    Ok(meta) if meta.is_dir() => {
                        tracing::debug!("manifest skip symlinked dir: {}", path.display());
                        false
                    }
                    Ok(meta) => meta.is_file(),
                    Err(err) => {
                        tracing::warn!("dangling symlink {}: {err}", path.display());
                        false
                    }
                }
            } else {
                file_type.is_file()
            };
            if !is_file {
                continue;
            }
            let relative = self.relative_path(&path);
            if self.is_excluded(&relative) {
                tracing::debug!("manifest skip: {relative}");
                continue;
            }
            manifest.insert(relative, digest_file(&path)?);
        }
        Ok(())
    }

    /// Root prefix and leading separator stripped, `/`-joined.
    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_excluded(&self, relative: &str) -> bool {
        let file_name = relative.rsplit('/').next().unwrap_or(relative);
        file_name == MANIFEST_FILE
            || file_name.ends_with(TMP_SUFFIX)
            || self.ignore.is_ignored(relative)
    }
}
