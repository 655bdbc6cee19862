//! Tera rendering engine: source tree scan and [`Renderer`].
//!
//! # Source tree mapping
//!
//! | Source file              | Output                               |
//! |--------------------------|--------------------------------------|
//! | `blog/index.html.tera`   | `blog/index.html`, rendered          |
//! | `_layout.html.tera`      | none (partial, include/extends only) |
//! | `css/site.css`           | `css/site.css`, copied verbatim      |
//! | ignored / `*.sw?`        | none                                 |

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tera::Tera;

use sitepush_core::IgnoreSet;

use crate::context::TemplateContext;
use crate::error::RenderError;

/// File extension marking a source file as a Tera template.
pub const TEMPLATE_EXTENSION: &str = "tera";

// ---------------------------------------------------------------------------
// Source scanning helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

/// Relative path with `/` separators regardless of platform.
fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_source_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io_err(dir, e))?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            collect_source_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        } else if file_type.is_symlink() && path.is_file() {
            // Linked files are read through; linked directories are skipped.
            out.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// What to do with one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Render the Tera template registered under `name`.
    Template { name: String },
    /// Copy the file as-is.
    Asset,
}

/// One emitted file of the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the source file.
    pub source: PathBuf,
    /// Output path relative to the output root, `/`-separated.
    pub output: String,
    pub kind: SourceKind,
}

fn is_partial(relative: &str) -> bool {
    relative
        .rsplit('/')
        .next()
        .is_some_and(|name| name.starts_with('_'))
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera engine loaded with every template of one source tree.
///
/// Create once per run with [`Renderer::new`] and pass by reference to each
/// render call; parsing all templates up front also surfaces syntax errors
/// before any output is written.
pub struct Renderer {
    tera: Tera,
    files: Vec<SourceFile>,
    partials_modified: Option<SystemTime>,
}

impl Renderer {
    /// Scan `source_dir`, skipping ignored paths, and load every `.tera` file.
    pub fn new(source_dir: &Path, ignore: &IgnoreSet) -> Result<Self, RenderError> {
        let mut paths = Vec::new();
        collect_source_files(source_dir, &mut paths)?;

        let suffix = format!(".{TEMPLATE_EXTENSION}");
        let mut templates = Vec::new();
        let mut files = Vec::new();
        let mut partials_modified: Option<SystemTime> = None;
        for path in paths {
            let relative = relative_name(source_dir, &path);
            if ignore.is_ignored(&relative) {
                continue;
            }
            match relative.strip_suffix(&suffix) {
                Some(output) => {
                    let contents =
                        std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
                    templates.push((relative.clone(), contents));
                    if is_partial(&relative) {
                        let modified = std::fs::metadata(&path)
                            .and_then(|meta| meta.modified())
                            .map_err(|e| io_err(&path, e))?;
                        partials_modified = partials_modified.max(Some(modified));
                    } else {
                        files.push(SourceFile {
                            source: path,
                            output: output.to_string(),
                            kind: SourceKind::Template { name: relative },
                        });
                    }
                }
                None => files.push(SourceFile {
                    source: path,
                    output: relative,
                    kind: SourceKind::Asset,
                }),
            }
        }

        let mut tera = Tera::default();
        // Site variables routinely carry markup; output is not HTML-escaped.
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(templates)?;
        Ok(Renderer {
            tera,
            files,
            partials_modified,
        })
    }

    /// Every file the source tree emits, sorted by source path.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Newest modification time among `_` partials, if there are any.
    ///
    /// Any page may pull a partial in, so every rendered page is at least as
    /// old as the newest one.
    pub fn partials_modified(&self) -> Option<SystemTime> {
        self.partials_modified
    }

    /// Render the template registered under `name`.
    pub fn render(&self, name: &str, ctx: &TemplateContext) -> Result<String, RenderError> {
        if !self.tera.get_template_names().any(|n| n == name) {
            return Err(RenderError::UnknownTemplate(name.to_string()));
        }
        let tera_ctx = ctx.to_tera_context()?;
        Ok(self.tera.render(name, &tera_ctx)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
