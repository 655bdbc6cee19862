//! Error types for sitepush-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading and validating site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the file path and serde_yaml line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A field the site needs for the requested operation is absent.
    #[error("site '{site}' is missing required field '{field}'")]
    MissingField { site: String, field: &'static str },

    /// An ignore pattern failed to compile.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The website base URL is not an http(s) URL.
    #[error("site '{site}' has invalid website url '{url}'; expected http:// or https://")]
    InvalidUrl { site: String, url: String },

    /// A credential was configured through an environment variable that is not set.
    #[error("site '{site}' reads its password from ${var}, which is not set")]
    MissingCredential { site: String, var: String },

    /// A configured directory does not exist on disk.
    #[error("site '{site}': directory {path} does not exist")]
    MissingDirectory { site: String, path: PathBuf },

    /// No site with the requested name exists in the configuration.
    #[error("site '{name}' not found in configuration")]
    SiteNotFound { name: String },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
