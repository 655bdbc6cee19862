//! Subcommand implementations and the helpers they share.

pub mod plan;
pub mod push;
pub mod render;
pub mod status;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sitepush_core::{config, types::DEFAULT_TIMEOUT, Config};
use sitepush_sync::SyncScope;

/// Load the configuration, naming the file on failure.
pub fn load_config(path: &Path) -> Result<Config> {
    config::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// `<site>` or `--all`, as accepted by `render` and `push`.
pub fn scope(site: Option<String>, all: bool) -> Result<SyncScope> {
    if all {
        return Ok(SyncScope::All);
    }
    let name = site.context("provide a site name or use --all")?;
    Ok(SyncScope::Site(name))
}

/// Longest timeout among the sites in `scope`; one fetcher serves them all.
pub fn fetch_timeout(config: &Config, scope: &SyncScope) -> Duration {
    let longest = match scope {
        SyncScope::All => config.sites().map(|s| s.timeout).max(),
        SyncScope::Site(name) => config.site(name).ok().map(|s| s.timeout),
    };
    longest.unwrap_or(DEFAULT_TIMEOUT)
}
