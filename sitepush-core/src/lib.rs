//! sitepush core library: typed site configuration and its errors.
//!
//! - [`config`]: load / validate `sitepush.yaml`
//! - [`types`]: [`SiteConfig`], [`RemoteConfig`], [`IgnoreSet`]
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, CONFIG_FILE};
pub use error::ConfigError;
pub use types::{
    is_editor_swap_file, DirConfig, FtpConfig, IgnoreSet, RemoteConfig, SiteConfig, SiteName,
};
