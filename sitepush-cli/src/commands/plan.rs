//! `sitepush plan`: the transfer plan for one site, read-only.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use sitepush_sync::{pipeline, ActionKind, HttpFetcher, SitePlan};

use super::load_config;

/// Arguments for `sitepush plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Name of the site to plan.
    pub site: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "directory")]
    directory: String,
    #[tabled(rename = "file")]
    file: String,
}

impl PlanArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let site = config.site(&self.site)?;
        let fetcher = HttpFetcher::new(site.timeout);

        let site_plan = pipeline::plan_site(site, &fetcher)
            .with_context(|| format!("plan failed for '{}'", self.site))?;
        print_plan(&site_plan);
        Ok(())
    }
}

fn print_plan(site_plan: &SitePlan) {
    let counts = site_plan.plan.counts();
    if site_plan.plan.is_empty() {
        println!(
            "✓ '{}' matches the remote ({} files)",
            site_plan.site,
            site_plan.local.len()
        );
        return;
    }

    let rows: Vec<PlanRow> = site_plan
        .plan
        .actions()
        .map(|(dir, action)| PlanRow {
            action: action_label(action.kind),
            directory: dir.to_string(),
            file: action.path.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());

    println!("{}", site_plan.site.to_string().bold());
    println!("{table}");
    println!(
        "{} new, {} update, {} remove ({} local, {} remote)",
        counts.new,
        counts.update,
        counts.remove,
        site_plan.local.len(),
        site_plan.remote.len()
    );
    if counts.remove > 0 {
        println!("Remote-only files are kept unless you run 'sitepush push --delete'.");
    }
}

fn action_label(kind: ActionKind) -> String {
    match kind {
        ActionKind::New => kind.to_string().green().to_string(),
        ActionKind::Update => kind.to_string().yellow().to_string(),
        ActionKind::Remove => kind.to_string().red().to_string(),
    }
}
