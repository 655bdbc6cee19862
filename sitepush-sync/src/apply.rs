//! Executing an [`ActionPlan`] against a [`RemoteStore`].
//!
//! ## `apply` order
//!
//! 1. `cd remote_root`; failure is fatal before any action.
//! 2. Record the absolute working directory as the baseline.
//! 3. Create missing directories, shortest key first.
//! 4. Upload every `New`/`Update`, counting failures without stopping.
//! 5. Upload the manifest if step 4 had no failure and the plan had any
//!    `New`/`Update` entry. A remove-only plan changes nothing remotely.
//!
//! The remote manifest is the only consistency mechanism the store offers,
//! so it advances last and only after a clean run.

use std::collections::BTreeSet;
use std::path::Path;

use crate::digest::MANIFEST_FILE;
use crate::error::SyncError;
use crate::plan::{ActionKind, ActionPlan, ROOT_DIR};
use crate::staleness::output_file;
use crate::store::RemoteStore;

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Report what would happen without calling the store at all.
    pub dry_run: bool,
    /// Remote directories (relative to the root) skipped by both passes,
    /// subdirectories included.
    pub ignore_dirs: BTreeSet<String>,
}

impl ApplyOptions {
    fn is_ignored_dir(&self, dir: &str) -> bool {
        self.ignore_dirs
            .iter()
            .any(|ignored| dir == ignored || dir.starts_with(&format!("{ignored}/")))
    }
}

/// Outcome of one apply (or removal) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Transfers (or deletions) attempted; in dry run, the ones that would be.
    pub attempted: usize,
    pub uploaded: usize,
    pub removed: usize,
    pub errors: usize,
    /// Relative paths whose transfer failed.
    pub failed: Vec<String>,
    /// Directories created during the creation pass.
    pub created_dirs: Vec<String>,
    pub manifest_uploaded: bool,
    pub dry_run: bool,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Upload every `New` and `Update` action of `plan`, then the manifest.
///
/// `Remove` actions are never executed here. Per-file failures are counted
/// in the report; only session positioning errors return `Err`.
pub fn apply(
    plan: &ActionPlan,
    store: &mut dyn RemoteStore,
    local_root: &Path,
    remote_root: &str,
    options: &ApplyOptions,
) -> Result<ApplyReport, SyncError> {
    if options.dry_run {
        return Ok(preview(plan, options));
    }

    let base = enter_root(store, remote_root)?;
    let mut report = ApplyReport::default();

    // Directory pass.
    for dir in plan.dirs_by_depth() {
        if dir == ROOT_DIR || options.is_ignored_dir(dir) {
            continue;
        }
        if !plan.actions_in(dir).iter().any(|a| a.kind.is_upload()) {
            continue;
        }
        ensure_dir(store, &base, dir, &mut report);
    }
    if !store.change_directory(&base) {
        tracing::warn!("could not return to {base}");
    }

    // Upload pass.
    for (dir, action) in plan.actions() {
        if !action.kind.is_upload() {
            continue;
        }
        if options.is_ignored_dir(dir) {
            tracing::debug!("skip {} (ignored dir {dir})", action.path);
            continue;
        }
        report.attempted += 1;
        let local = output_file(local_root, &action.path);
        let remote = format!("{base}{}", action.path);
        if store.put(&local, &remote) {
            tracing::info!("uploaded ({}): {}", action.kind, action.path);
            report.uploaded += 1;
        } else {
            tracing::warn!("upload failed: {}", action.path);
            report.errors += 1;
            report.failed.push(action.path.clone());
        }
    }

    if report.errors > 0 {
        tracing::warn!(
            "{} upload(s) failed; remote manifest left at its previous state",
            report.errors
        );
    } else if plan.actions().any(|(_, a)| a.kind.is_upload()) {
        // Also when every upload sat in an ignored dir: the remote manifest
        // must still learn those entries or they stay pending forever.
        upload_manifest(store, &base, local_root, &mut report);
    }
    Ok(report)
}

/// What `apply` would do, without touching the store.
pub fn preview(plan: &ActionPlan, options: &ApplyOptions) -> ApplyReport {
    let mut report = ApplyReport {
        dry_run: true,
        ..ApplyReport::default()
    };
    for (dir, action) in plan.actions() {
        if action.kind.is_upload() && !options.is_ignored_dir(dir) {
            tracing::info!("[dry-run] would upload ({}): {}", action.kind, action.path);
            report.attempted += 1;
        }
    }
    report
}

// ---------------------------------------------------------------------------
// apply_removals
// ---------------------------------------------------------------------------

/// Delete every `Remove` path of `plan` from the store.
///
/// The only caller of [`RemoteStore::delete`]. On a clean pass the manifest
/// is uploaded again so the remote copy stops listing the deleted files.
pub fn apply_removals(
    plan: &ActionPlan,
    store: &mut dyn RemoteStore,
    local_root: &Path,
    remote_root: &str,
    dry_run: bool,
) -> Result<ApplyReport, SyncError> {
    let removals: Vec<&str> = plan
        .actions()
        .filter(|(_, a)| a.kind == ActionKind::Remove)
        .map(|(_, a)| a.path.as_str())
        .collect();

    if dry_run {
        for path in &removals {
            tracing::info!("[dry-run] would remove: {path}");
        }
        return Ok(ApplyReport {
            attempted: removals.len(),
            dry_run: true,
            ..ApplyReport::default()
        });
    }
    if removals.is_empty() {
        return Ok(ApplyReport::default());
    }

    let base = enter_root(store, remote_root)?;
    let mut report = ApplyReport::default();
    for path in removals {
        report.attempted += 1;
        if store.delete(&format!("{base}{path}")) {
            tracing::info!("removed: {path}");
            report.removed += 1;
        } else {
            tracing::warn!("remove failed: {path}");
            report.errors += 1;
            report.failed.push(path.to_string());
        }
    }
    if report.errors == 0 {
        upload_manifest(store, &base, local_root, &mut report);
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `cd remote_root` and return the absolute working directory, `/`-terminated.
fn enter_root(store: &mut dyn RemoteStore, remote_root: &str) -> Result<String, SyncError> {
    if !store.change_directory(remote_root) {
        return Err(SyncError::Session(format!(
            "cannot change to remote root '{remote_root}'"
        )));
    }
    let mut base = store.current_directory().ok_or_else(|| {
        SyncError::Session(format!("no working directory after entering '{remote_root}'"))
    })?;
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(base)
}

/// Make sure `base + dir` exists, creating each missing level in turn.
/// Failures are only logged: uploads into the directory will fail and count.
fn ensure_dir(store: &mut dyn RemoteStore, base: &str, dir: &str, report: &mut ApplyReport) {
    if store.change_directory(&format!("{base}{dir}")) {
        return;
    }
    let mut current = base.trim_end_matches('/').to_string();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        if store.change_directory(&current) {
            continue;
        }
        if store.make_directory(&current) {
            tracing::info!("created dir: {current}");
            report.created_dirs.push(current.clone());
        } else {
            tracing::warn!("could not create {current}");
            return;
        }
    }
}

fn upload_manifest(
    store: &mut dyn RemoteStore,
    base: &str,
    local_root: &Path,
    report: &mut ApplyReport,
) {
    let local = local_root.join(MANIFEST_FILE);
    if store.put(&local, &format!("{base}{MANIFEST_FILE}")) {
        tracing::info!("uploaded manifest {MANIFEST_FILE}");
        report.manifest_uploaded = true;
    } else {
        tracing::warn!("manifest upload failed");
        report.errors += 1;
        report.failed.push(MANIFEST_FILE.to_string());
    }
}
