//! `sitepush render`: render templates and assets into the output tree.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use sitepush_sync::{pipeline, RenderSiteResult, WriteResult};

use super::{load_config, scope};

/// Arguments for `sitepush render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Name of the site to render (omit when using `--all`).
    pub site: Option<String>,

    /// Render every configured site.
    #[arg(long, conflicts_with = "site")]
    pub all: bool,

    /// Re-render files even when their output is newer than the source.
    #[arg(long)]
    pub force: bool,

    /// Show what would be written without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl RenderArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let scope = scope(self.site, self.all)?;

        let results = pipeline::render(&config, &scope, self.force, self.dry_run)
            .context("render failed")?;
        if results.is_empty() {
            println!("No sites configured in {}.", config_path.display());
        }
        for result in &results {
            print_results(result, self.dry_run);
        }
        Ok(())
    }
}

pub(crate) fn print_results(result: &RenderSiteResult, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let site = &result.site;
    let written = result.written();
    let unchanged = result.writes.len() - written;

    if result.writes.is_empty() {
        println!("{prefix}✓ '{site}' up to date ({} fresh)", result.fresh);
        return;
    }

    println!(
        "{prefix}✓ '{site}' rendered ({written} written, {unchanged} unchanged, {} fresh)",
        result.fresh
    );
    for write in &result.writes {
        match write {
            WriteResult::Written { path } => println!("  ✎  {}", path.display()),
            WriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
            WriteResult::Unchanged { path } => println!("  ·  {}", path.display()),
        }
    }
}
