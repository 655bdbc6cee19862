//! `sitepush push`: render, diff against the published manifest, upload.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sitepush_sync::{
    pipeline, ApplyReport, HttpFetcher, PushOptions, SitePushReport, StandardConnector,
};

use super::{fetch_timeout, load_config, render::print_results, scope};

/// Arguments for `sitepush push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Name of the site to push (omit when using `--all`).
    pub site: Option<String>,

    /// Push every configured site.
    #[arg(long, conflicts_with = "site")]
    pub all: bool,

    /// Render and plan only; write nothing locally or remotely.
    #[arg(long)]
    pub dry_run: bool,

    /// Re-render every file before pushing.
    #[arg(long)]
    pub force: bool,

    /// Also delete remote files that no longer exist locally.
    #[arg(long)]
    pub delete: bool,
}

impl PushArgs {
    pub fn run(self, config_path: &Path) -> Result<ExitCode> {
        let config = load_config(config_path)?;
        let scope = scope(self.site, self.all)?;
        let options = PushOptions {
            dry_run: self.dry_run,
            force: self.force,
            delete: self.delete,
        };
        let fetcher = HttpFetcher::new(fetch_timeout(&config, &scope));

        let reports = pipeline::run(&config, &scope, &options, &StandardConnector, &fetcher)
            .context("push failed")?;
        if reports.is_empty() {
            println!("No sites configured in {}.", config_path.display());
        }
        for report in &reports {
            print_report(report);
        }

        let failed: Vec<String> = reports
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.site.to_string())
            .collect();
        if failed.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
        eprintln!(
            "{} transfer errors for {}",
            "error:".red().bold(),
            failed.join(", ")
        );
        Ok(ExitCode::FAILURE)
    }
}

fn print_report(report: &SitePushReport) {
    let dry_run = report.apply.dry_run;
    let prefix = if dry_run { "[dry-run] " } else { "" };
    print_results(&report.render, dry_run);

    let counts = report.plan.counts();
    if report.plan.is_empty() {
        println!("{prefix}✓ '{}' remote is up to date", report.site);
        return;
    }
    println!(
        "{prefix}→ '{}' plan: {} new, {} update, {} remove",
        report.site, counts.new, counts.update, counts.remove
    );
    print_apply(&report.apply, "uploaded", report.apply.uploaded);
    if let Some(removals) = &report.removals {
        print_apply(removals, "removed", removals.removed);
    } else if counts.remove > 0 {
        println!("  {} remote-only files kept (use --delete)", counts.remove);
    }
}

fn print_apply(apply: &ApplyReport, verb: &str, done: usize) {
    if apply.dry_run {
        println!("  would have {verb} {}", apply.attempted);
        return;
    }
    println!("  {verb} {done}/{}", apply.attempted);
    for dir in &apply.created_dirs {
        println!("  +  {dir}/");
    }
    for path in &apply.failed {
        println!("  {}  {path}", "✗".red());
    }
    if apply.manifest_uploaded {
        println!("  manifest published");
    } else if apply.attempted > 0 {
        println!("  {}", "manifest not published".yellow());
    }
}
