//! Shared push pipeline entrypoints used by the CLI.
//!
//! Per site, strictly in order: render → build manifest → fetch remote
//! manifest → plan → open session → apply → (optionally) remove.

use std::time::SystemTime;

use sitepush_core::{Config, ConfigError, SiteConfig, SiteName};
use sitepush_renderer::Renderer;

use crate::apply::{apply, apply_removals, preview, ApplyOptions, ApplyReport};
use crate::error::SyncError;
use crate::fetch::{fetch_remote_manifest, ManifestFetcher};
use crate::manifest::{Manifest, ManifestBuilder};
use crate::plan::{plan, ActionPlan};
use crate::staleness::modified;
use crate::store::{open_session, Connector};
use crate::writer::{render_site, RenderOptions, RenderSiteResult};

/// Scope for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every configured site, in name order.
    All,
    /// A single named site.
    Site(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Render and plan only; no local writes, no store session.
    pub dry_run: bool,
    /// Re-render every file, stale or not.
    pub force: bool,
    /// Delete remote files that no longer exist locally.
    pub delete: bool,
}

/// Outcome of pushing one site.
#[derive(Debug)]
pub struct SitePushReport {
    pub site: SiteName,
    pub render: RenderSiteResult,
    pub plan: ActionPlan,
    pub apply: ApplyReport,
    /// Present only when removal was requested.
    pub removals: Option<ApplyReport>,
}

impl SitePushReport {
    /// False when any upload, removal or manifest transfer failed.
    pub fn is_success(&self) -> bool {
        self.apply.is_success() && self.removals.as_ref().map_or(true, ApplyReport::is_success)
    }
}

/// Local manifest, remote manifest, and the plan between them.
#[derive(Debug, Clone)]
pub struct SitePlan {
    pub site: SiteName,
    pub local: Manifest,
    pub remote: Manifest,
    pub plan: ActionPlan,
}

fn selected<'a>(config: &'a Config, scope: &SyncScope) -> Result<Vec<&'a SiteConfig>, SyncError> {
    match scope {
        SyncScope::All => Ok(config.sites().collect()),
        SyncScope::Site(name) => Ok(vec![config.site(name)?]),
    }
}

/// Outputs older than the config file are stale. Unknown mtime → no bound.
fn config_mtime(config: &Config) -> Option<SystemTime> {
    modified(&config.path).ok()
}

/// The template tree must exist before anything is rendered.
fn require_source(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.source.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingDirectory {
            site: site.name.0.clone(),
            path: site.source.clone(),
        })
    }
}

fn manifest_builder(site: &SiteConfig) -> ManifestBuilder {
    ManifestBuilder::new(&site.output).ignore(site.ignore.clone())
}

// ---------------------------------------------------------------------------
// render
// ---------------------------------------------------------------------------

/// Render the sites in `scope` without touching any remote.
pub fn render(
    config: &Config,
    scope: &SyncScope,
    force: bool,
    dry_run: bool,
) -> Result<Vec<RenderSiteResult>, SyncError> {
    let options = RenderOptions {
        force,
        dry_run,
        config_mtime: config_mtime(config),
    };
    let mut results = Vec::new();
    for site in selected(config, scope)? {
        require_source(site)?;
        let renderer = Renderer::new(&site.source, &site.ignore)?;
        results.push(render_site(site, &renderer, &options)?);
    }
    Ok(results)
}

// ---------------------------------------------------------------------------
// plan_site
// ---------------------------------------------------------------------------

/// Build the local manifest and diff it against the remote one.
///
/// Nothing is written locally and no store session is opened.
pub fn plan_site(site: &SiteConfig, fetcher: &dyn ManifestFetcher) -> Result<SitePlan, SyncError> {
    let base = site.remote_base()?;
    let local = manifest_builder(site).build()?;
    let remote = fetch_remote_manifest(fetcher, base);
    let plan = plan(&local, &remote);
    Ok(SitePlan {
        site: site.name.clone(),
        local,
        remote,
        plan,
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Push every site in `scope`.
///
/// Configuration, render, local I/O and session errors abort the run.
/// Per-file transfer failures do not; check [`SitePushReport::is_success`].
pub fn run(
    config: &Config,
    scope: &SyncScope,
    options: &PushOptions,
    connector: &dyn Connector,
    fetcher: &dyn ManifestFetcher,
) -> Result<Vec<SitePushReport>, SyncError> {
    let sites = selected(config, scope)?;
    // Fail fast on configuration before any site is touched.
    for site in &sites {
        site.remote_base()?;
        site.remote()?;
        require_source(site)?;
    }

    let render_options = RenderOptions {
        force: options.force,
        dry_run: options.dry_run,
        config_mtime: config_mtime(config),
    };
    let mut reports = Vec::new();
    for site in sites {
        tracing::info!("pushing site {}", site.name);
        reports.push(push_site(site, options, &render_options, connector, fetcher)?);
    }
    Ok(reports)
}

fn push_site(
    site: &SiteConfig,
    options: &PushOptions,
    render_options: &RenderOptions,
    connector: &dyn Connector,
    fetcher: &dyn ManifestFetcher,
) -> Result<SitePushReport, SyncError> {
    let remote = site.remote()?;
    let base = site.remote_base()?;

    let renderer = Renderer::new(&site.source, &site.ignore)?;
    let render = render_site(site, &renderer, render_options)?;

    let builder = manifest_builder(site);
    let local = if !options.dry_run {
        builder.build_and_persist()?
    } else if site.output.is_dir() {
        builder.build()?
    } else {
        Manifest::new()
    };

    let remote_manifest = fetch_remote_manifest(fetcher, base);
    let plan = plan(&local, &remote_manifest);
    let counts = plan.counts();
    tracing::info!(
        "{}: {} new, {} update, {} remove",
        site.name,
        counts.new,
        counts.update,
        counts.remove
    );

    let apply_options = ApplyOptions {
        dry_run: options.dry_run,
        ignore_dirs: site.remote_ignore_dirs.clone(),
    };

    if options.dry_run {
        let apply = preview(&plan, &apply_options);
        let removals = options.delete.then(|| ApplyReport {
            attempted: counts.remove,
            dry_run: true,
            ..ApplyReport::default()
        });
        return Ok(SitePushReport {
            site: site.name.clone(),
            render,
            plan,
            apply,
            removals,
        });
    }

    let mut store = open_session(connector, remote, site.timeout)?;
    let apply = apply(&plan, store.as_mut(), &site.output, remote.root(), &apply_options)?;
    let removals = if options.delete && apply.is_success() {
        Some(apply_removals(
            &plan,
            store.as_mut(),
            &site.output,
            remote.root(),
            false,
        )?)
    } else {
        if options.delete {
            tracing::warn!("{}: upload errors, skipping removal", site.name);
        }
        None
    };

    Ok(SitePushReport {
        site: site.name.clone(),
        render,
        plan,
        apply,
        removals,
    })
}
