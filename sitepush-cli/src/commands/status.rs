//! `sitepush status`: render staleness and pending transfers per site.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use sitepush_core::{Config, SiteConfig};
use sitepush_renderer::Renderer;
use sitepush_sync::{
    pipeline,
    staleness::{check, format_system_time_age, modified, preview_files, StalenessSignal},
    HttpFetcher, MANIFEST_FILE,
};

use super::load_config;

/// Arguments for `sitepush status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Skip fetching remote manifests.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "site")]
    site: String,
    #[tabled(rename = "render")]
    render: String,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "last build")]
    last_build: String,
    #[tabled(rename = "remote")]
    remote: String,
}

impl StatusArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        println!(
            "sitepush v{} | {} sites | {}",
            env!("CARGO_PKG_VERSION"),
            config.sites().count(),
            config.path.display()
        );
        if config.is_empty() {
            println!("No sites configured.");
            return Ok(());
        }

        let mut rows = Vec::new();
        let mut needs_render = false;
        for site in config.sites() {
            let signal = render_signal(&config, site)
                .with_context(|| format!("status check failed for '{}'", site.name))?;
            needs_render |= !matches!(signal, Some(StalenessSignal::Current));
            rows.push(StatusTableRow {
                site: site.name.to_string(),
                render: signal_label(signal.as_ref()),
                detail: signal_detail(signal.as_ref()),
                last_build: last_build(site),
                remote: if self.offline {
                    "-".to_string()
                } else {
                    remote_summary(site)
                },
            });
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        if needs_render {
            println!("Run 'sitepush render --all' to update stale sites.");
        }
        Ok(())
    }
}

/// `None` when the site's source tree is missing.
fn render_signal(config: &Config, site: &SiteConfig) -> Result<Option<StalenessSignal>> {
    if !site.source.is_dir() {
        return Ok(None);
    }
    let renderer = Renderer::new(&site.source, &site.ignore)?;
    let config_mtime = modified(&config.path).ok();
    Ok(Some(check(site, &renderer, config_mtime)?))
}

fn last_build(site: &SiteConfig) -> String {
    modified(&site.output.join(MANIFEST_FILE))
        .map(format_system_time_age)
        .unwrap_or_else(|_| "never".to_string())
}

fn remote_summary(site: &SiteConfig) -> String {
    if site.website.is_none() {
        return "no website".to_string();
    }
    if !site.output.is_dir() {
        return "not rendered".to_string();
    }
    match pipeline::plan_site(site, &HttpFetcher::new(site.timeout)) {
        Ok(site_plan) if site_plan.plan.is_empty() => "in sync".to_string(),
        Ok(site_plan) => {
            let counts = site_plan.plan.counts();
            format!(
                "{} new, {} update, {} remove",
                counts.new, counts.update, counts.remove
            )
        }
        Err(err) => {
            log::warn!("{}: could not plan: {err}", site.name);
            "unknown".to_string()
        }
    }
}

fn signal_label(signal: Option<&StalenessSignal>) -> String {
    match signal {
        None => "MISSING".red().bold().to_string(),
        Some(StalenessSignal::NeverRendered) => "NEVER RENDERED".bright_black().bold().to_string(),
        Some(StalenessSignal::Current) => "CURRENT".green().bold().to_string(),
        Some(StalenessSignal::Stale { .. }) => "STALE".yellow().bold().to_string(),
    }
}

fn signal_detail(signal: Option<&StalenessSignal>) -> String {
    match signal {
        None => "source directory missing".to_string(),
        Some(StalenessSignal::NeverRendered) => "no output yet".to_string(),
        Some(StalenessSignal::Current) => "up to date".to_string(),
        Some(StalenessSignal::Stale { files }) => format!("{} stale", preview_files(files)),
    }
}
