//! Diffing a local manifest against a remote one.
//!
//! Every path in `local ∪ remote` ends up in exactly one bucket:
//!
//! | local | remote | outcome         |
//! |-------|--------|-----------------|
//! | d     | -      | `New`           |
//! | d     | d'≠d   | `Update`        |
//! | d     | d      | reconciled (no action, absent from the plan) |
//! | -     | d      | `Remove`        |
//!
//! `Remove` actions are recorded for reporting; [`crate::apply::apply`] never
//! executes them. Only [`crate::apply::apply_removals`] does.

use std::collections::BTreeMap;
use std::fmt;

use crate::manifest::Manifest;

/// Directory key for files at the output root.
pub const ROOT_DIR: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    New,
    Update,
    Remove,
}

impl ActionKind {
    /// `New` and `Update` move bytes; `Remove` does not.
    pub fn is_upload(self) -> bool {
        matches!(self, ActionKind::New | ActionKind::Update)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::New => write!(f, "new"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Remove => write!(f, "remove"),
        }
    }
}

/// One reconciliation step for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAction {
    pub kind: ActionKind,
    pub path: String,
}

impl TransferAction {
    pub fn new(kind: ActionKind, path: impl Into<String>) -> Self {
        TransferAction {
            kind,
            path: path.into(),
        }
    }
}

/// Per-kind action totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub new: usize,
    pub update: usize,
    pub remove: usize,
}

impl PlanCounts {
    pub fn uploads(&self) -> usize {
        self.new + self.update
    }
}

/// Actions grouped by the dirname of their path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    dirs: BTreeMap<String, Vec<TransferAction>>,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Total number of actions across all directories.
    pub fn len(&self) -> usize {
        self.dirs.values().map(Vec::len).sum()
    }

    /// Actions recorded for `dir`, in path order.
    pub fn actions_in(&self, dir: &str) -> &[TransferAction] {
        self.dirs.get(dir).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Directory keys, shortest first; equal lengths fall back to
    /// lexicographic order. Shorter strings include every ancestor of a
    /// longer key, so walking this order creates parents before children.
    pub fn dirs_by_depth(&self) -> Vec<&str> {
        let mut dirs: Vec<&str> = self.dirs.keys().map(String::as_str).collect();
        dirs.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        dirs
    }

    /// Every action, directories in [`dirs_by_depth`](Self::dirs_by_depth) order.
    pub fn actions(&self) -> impl Iterator<Item = (&str, &TransferAction)> {
        self.dirs_by_depth()
            .into_iter()
            .flat_map(move |dir| self.actions_in(dir).iter().map(move |a| (dir, a)))
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for (_, action) in self.actions() {
            match action.kind {
                ActionKind::New => counts.new += 1,
                ActionKind::Update => counts.update += 1,
                ActionKind::Remove => counts.remove += 1,
            }
        }
        counts
    }

    fn push(&mut self, action: TransferAction) {
        self.dirs
            .entry(dirname(&action.path).to_string())
            .or_default()
            .push(action);
    }
}

/// String-level dirname: `a/b/c.html` → `a/b`, `c.html` → `.`.
///
/// No filesystem lookup; consecutive and trailing separators are collapsed
/// the way POSIX `dirname` does.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ROOT_DIR } else { "/" };
    }
    match trimmed.rfind('/') {
        None => ROOT_DIR,
        Some(idx) => {
            let parent = trimmed[..idx].trim_end_matches('/');
            if parent.is_empty() {
                "/"
            } else {
                parent
            }
        }
    }
}

/// Diff `local` against `remote`.
///
/// Output order is deterministic: within each directory, actions follow
/// lexicographic path order (both manifests iterate sorted).
pub fn plan(local: &Manifest, remote: &Manifest) -> ActionPlan {
    let mut actions = Vec::new();
    for (path, digest) in local.iter() {
        match remote.get(path) {
            None => actions.push(TransferAction::new(ActionKind::New, path)),
            Some(theirs) if theirs != digest => {
                actions.push(TransferAction::new(ActionKind::Update, path))
            }
            Some(_) => {}
        }
    }
    for (path, _) in remote.iter() {
        if !local.contains(path) {
            actions.push(TransferAction::new(ActionKind::Remove, path));
        }
    }
    actions.sort_by(|a, b| a.path.cmp(&b.path));

    let mut plan = ActionPlan::default();
    for action in actions {
        plan.push(action);
    }
    plan
}
