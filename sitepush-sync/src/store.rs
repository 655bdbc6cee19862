//! Remote file store session contract and the filesystem-backed store.
//!
//! A session is stateful: it has a current directory, and every
//! `bool`-returning call reports failure only as `false`. The applier never
//! relies on that ambient directory for uploads; it threads absolute remote
//! paths through every `put`, so the cursor only matters for navigation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sitepush_core::RemoteConfig;

use crate::error::SyncError;
use crate::ftp::FtpConnector;
use crate::writer::write_atomic;

/// An authenticated connection to the destination store.
pub trait RemoteStore {
    fn authenticate(&mut self, user: &str, password: &str) -> bool;

    /// Change the working directory; absolute or relative to the current one.
    fn change_directory(&mut self, path: &str) -> bool;

    /// Absolute working directory, if the store can report it.
    fn current_directory(&mut self) -> Option<String>;

    /// Create one directory level; the parent must already exist.
    fn make_directory(&mut self, path: &str) -> bool;

    fn set_binary_mode(&mut self) -> bool;

    /// Upload `local` to `remote` (absolute or relative to the working directory).
    fn put(&mut self, local: &Path, remote: &str) -> bool;

    /// Delete a remote file. Only explicit removal calls this.
    fn delete(&mut self, remote: &str) -> bool;
}

/// Which store implementation a [`ConnectOptions`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Ftp,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub kind: StoreKind,
    pub port: Option<u16>,
    /// Applied to connect and to every transfer.
    pub timeout: Duration,
}

impl ConnectOptions {
    pub fn for_remote(remote: &RemoteConfig, timeout: Duration) -> Self {
        match remote {
            RemoteConfig::Ftp(ftp) => ConnectOptions {
                kind: StoreKind::Ftp,
                port: Some(ftp.port),
                timeout,
            },
            RemoteConfig::Dir(_) => ConnectOptions {
                kind: StoreKind::Dir,
                port: None,
                timeout,
            },
        }
    }
}

/// Opens store sessions.
pub trait Connector {
    /// `None` when the host cannot be reached.
    fn connect(&self, host: &str, options: &ConnectOptions) -> Option<Box<dyn RemoteStore>>;
}

/// Opens [`DirStore`] sessions; the host is the base directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirConnector;

impl Connector for DirConnector {
    fn connect(&self, host: &str, _options: &ConnectOptions) -> Option<Box<dyn RemoteStore>> {
        DirStore::open(host).map(|store| Box::new(store) as Box<dyn RemoteStore>)
    }
}

/// Dispatches on [`StoreKind`] to the built-in connectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConnector;

impl Connector for StandardConnector {
    fn connect(&self, host: &str, options: &ConnectOptions) -> Option<Box<dyn RemoteStore>> {
        match options.kind {
            StoreKind::Ftp => FtpConnector.connect(host, options),
            StoreKind::Dir => DirConnector.connect(host, options),
        }
    }
}

/// Connect, authenticate and switch to binary mode. Any failure is fatal.
pub fn open_session(
    connector: &dyn Connector,
    remote: &RemoteConfig,
    timeout: Duration,
) -> Result<Box<dyn RemoteStore>, SyncError> {
    let host = remote.host();
    let options = ConnectOptions::for_remote(remote, timeout);
    let mut store = connector
        .connect(&host, &options)
        .ok_or_else(|| SyncError::Session(format!("cannot connect to {host}")))?;

    if let RemoteConfig::Ftp(ftp) = remote {
        if !store.authenticate(&ftp.user, &ftp.password) {
            return Err(SyncError::Session(format!(
                "login as '{}' on {host} rejected",
                ftp.user
            )));
        }
    }
    if !store.set_binary_mode() {
        return Err(SyncError::Session(format!(
            "{host} refused binary transfer mode"
        )));
    }
    tracing::info!("connected to {host}");
    Ok(store)
}

// ---------------------------------------------------------------------------
// DirStore
// ---------------------------------------------------------------------------

/// Remote store backed by a local directory (mounted share, staging tree).
///
/// Remote paths are virtual and absolute from `/`, which maps to `base`;
/// `..` never climbs above it.
#[derive(Debug)]
pub struct DirStore {
    base: PathBuf,
    cwd: String,
}

impl DirStore {
    /// `None` when `base` is not an existing directory.
    pub fn open(base: impl Into<PathBuf>) -> Option<Self> {
        let base = base.into();
        if !base.is_dir() {
            tracing::warn!("dir store base {} is not a directory", base.display());
            return None;
        }
        Some(DirStore {
            base,
            cwd: "/".to_string(),
        })
    }

    /// Normalized absolute virtual path for `path`.
    fn resolve(&self, path: &str) -> String {
        let joined = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("{}/{}", self.cwd, path)
        };
        let mut parts: Vec<&str> = Vec::new();
        for part in joined.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn local_path(&self, virtual_path: &str) -> PathBuf {
        let mut local = self.base.clone();
        for part in virtual_path.split('/').filter(|p| !p.is_empty()) {
            local.push(part);
        }
        local
    }
}

impl RemoteStore for DirStore {
    fn authenticate(&mut self, _user: &str, _password: &str) -> bool {
        true
    }

    fn change_directory(&mut self, path: &str) -> bool {
        let target = self.resolve(path);
        if self.local_path(&target).is_dir() {
            self.cwd = target;
            true
        } else {
            false
        }
    }

    fn current_directory(&mut self) -> Option<String> {
        Some(self.cwd.clone())
    }

    fn make_directory(&mut self, path: &str) -> bool {
        let target = self.local_path(&self.resolve(path));
        match std::fs::create_dir(&target) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("mkdir {} failed: {err}", target.display());
                false
            }
        }
    }

    fn set_binary_mode(&mut self) -> bool {
        true
    }

    fn put(&mut self, local: &Path, remote: &str) -> bool {
        let target = self.local_path(&self.resolve(remote));
        if !target.parent().is_some_and(Path::is_dir) {
            return false;
        }
        let result = std::fs::read(local)
            .map_err(|e| crate::error::io_err(local, e))
            .and_then(|bytes| write_atomic(&target, &bytes));
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!("put {} failed: {err}", target.display());
                false
            }
        }
    }

    fn delete(&mut self, remote: &str) -> bool {
        let target = self.local_path(&self.resolve(remote));
        std::fs::remove_file(target).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepush_core::{DirConfig, FtpConfig};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn dir_store_navigation_stays_inside_base() {
        let base = TempDir::new().unwrap();
        fs::create_dir_all(base.path().join("www/blog")).unwrap();
        let mut store = DirStore::open(base.path()).unwrap();

        assert!(store.change_directory("www"));
        assert_eq!(store.current_directory().as_deref(), Some("/www"));
        assert!(store.change_directory("blog"));
        assert_eq!(store.current_directory().as_deref(), Some("/www/blog"));
        assert!(store.change_directory("../../../.."));
        assert_eq!(store.current_directory().as_deref(), Some("/"));
        assert!(!store.change_directory("/missing"));
        assert_eq!(store.current_directory().as_deref(), Some("/"));
    }

    #[test]
    fn dir_store_mkdir_is_single_level() {
        let base = TempDir::new().unwrap();
        let mut store = DirStore::open(base.path()).unwrap();
        assert!(!store.make_directory("/a/b"), "parent missing");
        assert!(store.make_directory("/a"));
        assert!(store.make_directory("/a/b"));
        assert!(!store.make_directory("/a"), "already exists");
        assert!(base.path().join("a/b").is_dir());
    }

    #[test]
    fn dir_store_put_requires_parent_and_copies_bytes() {
        let base = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let local = src.path().join("page.html");
        fs::write(&local, b"<p>hi</p>").unwrap();

        let mut store = DirStore::open(base.path()).unwrap();
        assert!(!store.put(&local, "/blog/page.html"));
        assert!(store.make_directory("/blog"));
        assert!(store.put(&local, "/blog/page.html"));
        assert_eq!(fs::read(base.path().join("blog/page.html")).unwrap(), b"<p>hi</p>");
        assert!(!store.put(&src.path().join("absent"), "/blog/x.html"));

        assert!(store.delete("/blog/page.html"));
        assert!(!base.path().join("blog/page.html").exists());
    }

    #[test]
    fn open_session_on_missing_dir_is_fatal() {
        let base = TempDir::new().unwrap();
        let remote = RemoteConfig::Dir(DirConfig {
            path: base.path().join("absent"),
            root: ".".into(),
        });
        let err = open_session(&StandardConnector, &remote, Duration::from_secs(1))
            .err()
            .expect("error");
        assert!(matches!(err, SyncError::Session(_)), "got: {err}");
    }

    #[test]
    fn connect_options_follow_remote_kind() {
        let ftp = RemoteConfig::Ftp(FtpConfig {
            host: "h".into(),
            port: 2121,
            user: "u".into(),
            password: String::new(),
            root: ".".into(),
        });
        let options = ConnectOptions::for_remote(&ftp, Duration::from_secs(3));
        assert_eq!(options.kind, StoreKind::Ftp);
        assert_eq!(options.port, Some(2121));
    }
}
