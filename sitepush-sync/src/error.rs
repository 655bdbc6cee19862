//! Error types for sitepush-sync.

use std::path::PathBuf;

use thiserror::Error;

use sitepush_core::ConfigError;
use sitepush_renderer::RenderError;

/// All fatal errors a sync run can hit.
///
/// Recoverable failures (remote manifest fetch, per-file uploads, directory
/// creation) never surface here; they are logged and counted instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An error from the site configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote store session could not be established or positioned.
    #[error("remote session error: {0}")]
    Session(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
