use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sitepush_sync::apply::{apply, apply_removals, ApplyOptions};
use sitepush_sync::plan::plan;
use sitepush_sync::{ActionPlan, Manifest, RemoteStore, SyncError, MANIFEST_FILE};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Cd(String),
    Pwd,
    Mkd(String),
    Put(String),
    Delete(String),
}

/// In-memory store that records every call. Paths are normalized the way a
/// real server would resolve them against the working directory.
struct RecordingStore {
    calls: Vec<Call>,
    cwd: String,
    dirs: BTreeSet<String>,
    files: BTreeSet<String>,
    fail_put: BTreeSet<String>,
    refuse_mkdir: BTreeSet<String>,
}

impl RecordingStore {
    fn with_dirs(dirs: &[&str]) -> Self {
        RecordingStore {
            calls: Vec::new(),
            cwd: "/".to_string(),
            dirs: dirs.iter().map(|d| d.to_string()).collect(),
            files: BTreeSet::new(),
            fail_put: BTreeSet::new(),
            refuse_mkdir: BTreeSet::new(),
        }
    }

    fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.cwd, path)
        };
        let parts: Vec<&str> = joined
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        format!("/{}", parts.join("/"))
    }

    fn parent(path: &str) -> String {
        match path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => path[..idx].to_string(),
        }
    }

    fn mutations(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Mkd(_) | Call::Put(_) | Call::Delete(_)))
            .collect()
    }

    fn puts(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Put(p) => Some(p.as_str()),
                _ => None,
            })
            .collect()
    }

    fn mkdirs(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Mkd(p) => Some(p.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RemoteStore for RecordingStore {
    fn authenticate(&mut self, _user: &str, _password: &str) -> bool {
        true
    }

    fn change_directory(&mut self, path: &str) -> bool {
        self.calls.push(Call::Cd(path.to_string()));
        let target = self.resolve(path);
        if self.dirs.contains(&target) {
            self.cwd = target;
            true
        } else {
            false
        }
    }

    fn current_directory(&mut self) -> Option<String> {
        self.calls.push(Call::Pwd);
        Some(self.cwd.clone())
    }

    fn make_directory(&mut self, path: &str) -> bool {
        self.calls.push(Call::Mkd(path.to_string()));
        let target = self.resolve(path);
        if self.refuse_mkdir.contains(&target) || !self.dirs.contains(&Self::parent(&target)) {
            return false;
        }
        self.dirs.insert(target)
    }

    fn set_binary_mode(&mut self) -> bool {
        true
    }

    fn put(&mut self, _local: &Path, remote: &str) -> bool {
        self.calls.push(Call::Put(remote.to_string()));
        let target = self.resolve(remote);
        if self.fail_put.contains(&target) || !self.dirs.contains(&Self::parent(&target)) {
            return false;
        }
        self.files.insert(target);
        true
    }

    fn delete(&mut self, remote: &str) -> bool {
        self.calls.push(Call::Delete(remote.to_string()));
        let target = self.resolve(remote);
        self.files.remove(&target)
    }
}

fn manifest(entries: &[(&str, char)]) -> Manifest {
    entries
        .iter()
        .map(|(path, d)| (path.to_string(), d.to_string().repeat(64)))
        .collect()
}

fn plan_for(local: &[(&str, char)], remote: &[(&str, char)]) -> ActionPlan {
    plan(&manifest(local), &manifest(remote))
}

fn local_root() -> PathBuf {
    PathBuf::from("/srv/out")
}

fn run(plan: &ActionPlan, store: &mut RecordingStore) -> sitepush_sync::ApplyReport {
    apply(plan, store, &local_root(), "/www", &ApplyOptions::default()).expect("apply")
}

#[test]
fn remove_actions_are_never_executed_by_apply() {
    let plan = plan_for(&[("index.html", '1')], &[("old.html", 'a'), ("gone/x.html", 'b')]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);

    let report = run(&plan, &mut store);

    assert!(
        !store.calls.iter().any(|c| matches!(c, Call::Delete(_))),
        "apply must never delete: {:?}",
        store.calls
    );
    assert!(store.mkdirs().is_empty(), "remove-only dirs are not created");
    assert_eq!(report.attempted, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.removed, 0);
}

#[test]
fn stale_remote_only_plan_performs_no_mutation() {
    let plan = plan_for(&[], &[("old.html", 'a')]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);

    let report = run(&plan, &mut store);

    assert!(store.mutations().is_empty(), "got: {:?}", store.calls);
    assert_eq!(report.attempted, 0);
    assert!(!report.manifest_uploaded);
    assert!(report.is_success());
}

#[test]
fn one_failed_upload_is_isolated_and_blocks_manifest() {
    let plan = plan_for(
        &[("a.html", '1'), ("b.html", '2'), ("c.html", '3')],
        &[("b.html", '9')],
    );
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);
    store.fail_put.insert("/www/b.html".to_string());

    let report = run(&plan, &mut store);

    assert_eq!(report.attempted, 3);
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.errors, 1);
    assert_eq!(report.failed, vec!["b.html".to_string()]);
    assert!(!report.manifest_uploaded);
    assert_eq!(store.puts(), vec!["/www/a.html", "/www/b.html", "/www/c.html"]);
}

#[test]
fn clean_apply_uploads_manifest_last() {
    let plan = plan_for(&[("a.html", '1'), ("blog/post.html", '2')], &[]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);

    let report = run(&plan, &mut store);

    assert!(report.is_success());
    assert!(report.manifest_uploaded);
    let manifest_put = format!("/www/{MANIFEST_FILE}");
    assert_eq!(
        store.calls.last(),
        Some(&Call::Put(manifest_put)),
        "manifest must be the final call"
    );
    assert_eq!(report.created_dirs, vec!["/www/blog".to_string()]);
}

#[test]
fn directories_are_created_shortest_first() {
    let plan = plan_for(
        &[("ab/y.html", '1'), ("a/x.html", '2'), ("a/b/z.html", '3')],
        &[],
    );
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);

    let report = run(&plan, &mut store);

    assert_eq!(store.mkdirs(), vec!["/www/a", "/www/ab", "/www/a/b"]);
    assert_eq!(report.errors, 0);
}

#[test]
fn missing_ancestors_are_created_level_by_level() {
    let plan = plan_for(&[("x/y/z.html", '1')], &[]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);

    let report = run(&plan, &mut store);

    assert_eq!(store.mkdirs(), vec!["/www/x", "/www/x/y"]);
    assert_eq!(report.uploaded, 1);
}

#[test]
fn existing_directories_are_not_recreated() {
    let plan = plan_for(&[("blog/post.html", '1')], &[]);
    let mut store = RecordingStore::with_dirs(&["/", "/www", "/www/blog"]);

    run(&plan, &mut store);

    assert!(store.mkdirs().is_empty());
}

#[test]
fn mkdir_failure_is_a_warning_and_the_upload_counts_as_error() {
    let plan = plan_for(&[("locked/a.html", '1'), ("open/b.html", '2')], &[]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);
    store.refuse_mkdir.insert("/www/locked".to_string());

    let report = run(&plan, &mut store);

    assert_eq!(report.attempted, 2);
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.failed, vec!["locked/a.html".to_string()]);
    assert!(!report.manifest_uploaded);
}

#[test]
fn unreachable_remote_root_is_fatal_before_any_action() {
    let plan = plan_for(&[("a.html", '1')], &[]);
    let mut store = RecordingStore::with_dirs(&["/"]);

    let err = apply(&plan, &mut store, &local_root(), "/www", &ApplyOptions::default())
        .unwrap_err();

    assert!(matches!(err, SyncError::Session(_)), "got: {err}");
    assert_eq!(store.calls, vec![Call::Cd("/www".to_string())]);
}

#[test]
fn dry_run_makes_no_store_calls() {
    let plan = plan_for(&[("a.html", '1'), ("d/b.html", '2')], &[("old.html", '3')]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);
    let options = ApplyOptions {
        dry_run: true,
        ..ApplyOptions::default()
    };

    let report = apply(&plan, &mut store, &local_root(), "/www", &options).unwrap();
    let removals = apply_removals(&plan, &mut store, &local_root(), "/www", true).unwrap();

    assert!(store.calls.is_empty(), "got: {:?}", store.calls);
    assert!(report.dry_run);
    assert_eq!(report.attempted, 2);
    assert_eq!(removals.attempted, 1);
    assert_eq!(removals.removed, 0);
}

#[test]
fn ignored_remote_dirs_are_skipped_entirely() {
    let plan = plan_for(
        &[("index.html", '1'), ("stats/hits.html", '2'), ("stats/2026/jan.html", '3')],
        &[],
    );
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);
    let options = ApplyOptions {
        dry_run: false,
        ignore_dirs: ["stats".to_string()].into_iter().collect(),
    };

    let report = apply(&plan, &mut store, &local_root(), "/www", &options).unwrap();

    assert!(store.mkdirs().is_empty());
    assert_eq!(
        store.puts(),
        vec!["/www/index.html".to_string(), format!("/www/{MANIFEST_FILE}")]
    );
    assert_eq!(report.attempted, 1);
}

#[test]
fn plan_confined_to_ignored_dirs_still_publishes_manifest() {
    let plan = plan_for(&[("index.html", '1'), ("stats/hits.html", '2')], &[("index.html", '1')]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);
    let options = ApplyOptions {
        dry_run: false,
        ignore_dirs: ["stats".to_string()].into_iter().collect(),
    };

    let report = apply(&plan, &mut store, &local_root(), "/www", &options).unwrap();

    assert_eq!(report.attempted, 0);
    assert!(report.manifest_uploaded);
    assert_eq!(store.puts(), vec![format!("/www/{MANIFEST_FILE}")]);
    assert!(store.mkdirs().is_empty());
}

#[test]
fn relative_remote_root_resolves_against_login_directory() {
    let plan = plan_for(&[("a.html", '1')], &[]);
    let mut store = RecordingStore::with_dirs(&["/", "/home", "/home/site"]);
    store.cwd = "/home".to_string();

    let report = apply(&plan, &mut store, &local_root(), "site", &ApplyOptions::default())
        .unwrap();

    assert!(report.is_success());
    assert_eq!(store.puts()[0], "/home/site/a.html");
}

#[test]
fn explicit_removal_deletes_and_republishes_manifest() {
    let plan = plan_for(&[("keep.html", '1')], &[("keep.html", '1'), ("old.html", 'a')]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);
    store.files.insert("/www/old.html".to_string());

    let report = apply_removals(&plan, &mut store, &local_root(), "/www", false).unwrap();

    assert_eq!(report.removed, 1);
    assert!(report.manifest_uploaded);
    assert!(store.calls.contains(&Call::Delete("/www/old.html".to_string())));
    assert!(!store.files.contains("/www/old.html"));
}

#[test]
fn failed_removal_keeps_remote_manifest() {
    let plan = plan_for(&[], &[("missing.html", 'a')]);
    let mut store = RecordingStore::with_dirs(&["/", "/www"]);

    let report = apply_removals(&plan, &mut store, &local_root(), "/www", false).unwrap();

    assert_eq!(report.errors, 1);
    assert!(!report.manifest_uploaded);
    assert!(store.puts().is_empty());
}
