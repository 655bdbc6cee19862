//! Validated configuration types.
//!
//! Every struct here is produced by [`crate::config::load`] after the raw YAML
//! has been checked; holding one means the required fields are present.
//! All path fields use `PathBuf`; remote paths stay `String` (they are not
//! local filesystem paths).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;

/// Network timeout applied when a site does not set `timeout_secs`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a site entry in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteName(pub String);

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SiteName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SiteName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Ignore patterns
// ---------------------------------------------------------------------------

/// Precompiled ignore matcher.
///
/// Built once when the configuration loads and shared by the renderer and the
/// manifest builder. Editor swap files (`*.sw?`) are always ignored, whatever
/// the configured patterns.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreSet {
    /// Compile `patterns`; the first invalid pattern fails the whole set.
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        let set = builder.build().map_err(|source| ConfigError::InvalidPattern {
            pattern: kept.join(", "),
            source,
        })?;
        Ok(IgnoreSet {
            patterns: kept,
            set,
        })
    }

    /// A set that only ignores editor swap files.
    pub fn empty() -> Self {
        IgnoreSet {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// The source patterns, in configuration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a `/`-separated path relative to a site root is ignored.
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        is_editor_swap_file(file_name) || self.set.is_match(relative_path)
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        IgnoreSet::empty()
    }
}

/// `true` for vim-style swap files: `.index.html.swp`, `notes.swo`, ...
pub fn is_editor_swap_file(file_name: &str) -> bool {
    file_name
        .strip_suffix(|_: char| true)
        .is_some_and(|rest| rest.ends_with(".sw"))
}

// ---------------------------------------------------------------------------
// Remote store configuration
// ---------------------------------------------------------------------------

/// Where a site is pushed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteConfig {
    Ftp(FtpConfig),
    Dir(DirConfig),
}

impl RemoteConfig {
    /// Remote directory the site is published into.
    pub fn root(&self) -> &str {
        match self {
            RemoteConfig::Ftp(ftp) => &ftp.root,
            RemoteConfig::Dir(dir) => &dir.root,
        }
    }

    /// Host (FTP) or local path (dir store) handed to the connector.
    pub fn host(&self) -> String {
        match self {
            RemoteConfig::Ftp(ftp) => ftp.host.clone(),
            RemoteConfig::Dir(dir) => dir.path.display().to_string(),
        }
    }
}

/// FTP server credentials and publish root.
#[derive(Clone, PartialEq, Eq)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Resolved password (literal or read from the configured env var).
    pub password: String,
    pub root: String,
}

impl fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("root", &self.root)
            .finish()
    }
}

/// Filesystem-backed remote: a mounted share or staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirConfig {
    pub path: PathBuf,
    pub root: String,
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// One publishable site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub name: SiteName,
    /// Template source tree.
    pub source: PathBuf,
    /// Rendered output tree; the manifest lives at its root.
    pub output: PathBuf,
    /// Public base URL the remote manifest is fetched from.
    pub website: Option<String>,
    /// Arbitrary template variables.
    pub variables: BTreeMap<String, serde_json::Value>,
    pub ignore: IgnoreSet,
    pub remote: Option<RemoteConfig>,
    /// Directories excluded from remote directory creation and upload.
    pub remote_ignore_dirs: BTreeSet<String>,
    pub timeout: Duration,
}

impl SiteConfig {
    /// The website base URL, which every remote operation needs.
    pub fn remote_base(&self) -> Result<&str, ConfigError> {
        self.website
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                site: self.name.0.clone(),
                field: "website",
            })
    }

    /// The remote store configuration, which `push` needs.
    pub fn remote(&self) -> Result<&RemoteConfig, ConfigError> {
        self.remote.as_ref().ok_or_else(|| ConfigError::MissingField {
            site: self.name.0.clone(),
            field: "remote",
        })
    }
}
