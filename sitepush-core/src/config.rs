//! YAML site configuration.
//!
//! # File layout
//!
//! ```yaml
//! sites:
//!   blog:
//!     source: templates
//!     output: public
//!     website: https://blog.example.com/
//!     variables: { title: My Blog }
//!     ignore: ["*.bak"]
//!     remote_ignore_dirs: [stats]
//!     timeout_secs: 30
//!     remote:
//!       ftp: { host: ftp.example.com, user: deploy, password_env: BLOG_FTP_PASSWORD, root: /htdocs }
//! ```
//!
//! Relative `source`/`output`/`dir.path` values resolve against the directory
//! holding the configuration file. Raw serde structs are private; callers only
//! ever see the validated [`SiteConfig`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{io_err, ConfigError};
use crate::types::{
    DirConfig, FtpConfig, IgnoreSet, RemoteConfig, SiteConfig, SiteName, DEFAULT_FTP_PORT,
    DEFAULT_TIMEOUT,
};

/// Default configuration file name looked up by the CLI.
pub const CONFIG_FILE: &str = "sitepush.yaml";

// ---------------------------------------------------------------------------
// Raw (on-disk) shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    sites: BTreeMap<String, RawSite>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSite {
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    website: Option<String>,
    #[serde(default)]
    variables: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    remote_ignore_dirs: Vec<String>,
    timeout_secs: Option<u64>,
    remote: Option<RawRemote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawRemote {
    Ftp(RawFtp),
    Dir(RawDir),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFtp {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    password_env: Option<String>,
    root: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDir {
    path: Option<PathBuf>,
    root: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// Every site defined in one configuration file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path the configuration was loaded from.
    pub path: PathBuf,
    sites: BTreeMap<SiteName, SiteConfig>,
}

impl Config {
    /// Look up a site by name.
    pub fn site(&self, name: &str) -> Result<&SiteConfig, ConfigError> {
        self.sites
            .get(&SiteName::from(name))
            .ok_or_else(|| ConfigError::SiteNotFound {
                name: name.to_string(),
            })
    }

    /// All sites, sorted by name.
    pub fn sites(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.values()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// `<dir>/sitepush.yaml`. Pure, no I/O.
pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Load and validate the configuration at `path`, resolving `password_env`
/// from the process environment.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    load_with_env(path, |var| std::env::var(var).ok())
}

/// Load and validate the configuration at `path` with an explicit environment
/// lookup for `password_env` credentials.
pub fn load_with_env(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse_with_env(path, &contents, env)
}

/// Validate configuration text as if it had been read from `path`.
pub fn parse_with_env(
    path: &Path,
    contents: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut sites = BTreeMap::new();
    for (name, raw_site) in raw.sites {
        let site = validate_site(&name, raw_site, base, &env)?;
        sites.insert(site.name.clone(), site);
    }
    Ok(Config {
        path: path.to_path_buf(),
        sites,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_site(
    name: &str,
    raw: RawSite,
    base: &Path,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<SiteConfig, ConfigError> {
    let missing = |field: &'static str| ConfigError::MissingField {
        site: name.to_string(),
        field,
    };

    let source = base.join(raw.source.ok_or_else(|| missing("source"))?);
    let output = base.join(raw.output.ok_or_else(|| missing("output"))?);
    let website = raw
        .website
        .map(|url| normalize_website(name, url))
        .transpose()?;

    let remote = match raw.remote {
        None => None,
        Some(RawRemote::Ftp(ftp)) => Some(RemoteConfig::Ftp(validate_ftp(name, ftp, env)?)),
        Some(RawRemote::Dir(dir)) => Some(RemoteConfig::Dir(DirConfig {
            path: base.join(dir.path.ok_or_else(|| missing("remote.dir.path"))?),
            root: dir.root.unwrap_or_else(|| ".".to_string()),
        })),
    };
    // Diffing against the remote is impossible without the public manifest.
    if remote.is_some() && website.is_none() {
        return Err(missing("website"));
    }

    let remote_ignore_dirs: BTreeSet<String> = raw
        .remote_ignore_dirs
        .iter()
        .map(|dir| dir.trim_matches('/').to_string())
        .filter(|dir| !dir.is_empty())
        .collect();

    Ok(SiteConfig {
        name: SiteName::from(name),
        source,
        output,
        website,
        variables: raw.variables,
        ignore: IgnoreSet::new(&raw.ignore)?,
        remote,
        remote_ignore_dirs,
        timeout: raw
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT),
    })
}

fn validate_ftp(
    site: &str,
    raw: RawFtp,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<FtpConfig, ConfigError> {
    let missing = |field: &'static str| ConfigError::MissingField {
        site: site.to_string(),
        field,
    };
    let host = raw.host.ok_or_else(|| missing("remote.ftp.host"))?;
    let user = raw.user.ok_or_else(|| missing("remote.ftp.user"))?;
    let password = match (raw.password, raw.password_env) {
        (Some(password), _) => password,
        (None, Some(var)) => env(&var).ok_or_else(|| ConfigError::MissingCredential {
            site: site.to_string(),
            var,
        })?,
        (None, None) => String::new(),
    };
    Ok(FtpConfig {
        host,
        port: raw.port.unwrap_or(DEFAULT_FTP_PORT),
        user,
        password,
        root: raw.root.unwrap_or_else(|| ".".to_string()),
    })
}

/// Require an http(s) scheme and a trailing `/` so the manifest name can be
/// appended directly.
fn normalize_website(site: &str, url: String) -> Result<String, ConfigError> {
    let url = url.trim().to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl {
            site: site.to_string(),
            url,
        });
    }
    if url.ends_with('/') {
        Ok(url)
    } else {
        Ok(format!("{url}/"))
    }
}
