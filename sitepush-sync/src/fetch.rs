//! Remote manifest retrieval.
//!
//! The remote manifest is published next to the site itself, so it is read
//! back over plain HTTP(S) rather than through the store session. Any failure
//! degrades to an empty manifest: the first push of a site has nothing to
//! fetch, and an unreadable manifest only costs a full re-upload.

use std::time::Duration;

use thiserror::Error;

use crate::digest::{parse_manifest, MANIFEST_FILE};
use crate::manifest::Manifest;

/// Why a GET failed. Only ever logged.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
}

/// Content-fetch channel used to read the remote manifest.
pub trait ManifestFetcher {
    /// GET `url` and return the body as text.
    fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// [`ManifestFetcher`] over `ureq` with a bounded timeout.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// `timeout` bounds the whole request, connect included.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("sitepush/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpFetcher { agent }
    }
}

impl ManifestFetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<String, FetchError> {
        match self.agent.get(url).call() {
            Ok(response) => Ok(response.into_string()?),
            Err(ureq::Error::Status(code, _)) => Err(FetchError::Status(code)),
            Err(ureq::Error::Transport(transport)) => {
                Err(FetchError::Transport(transport.to_string()))
            }
        }
    }
}

/// `<base_url><manifest file>`; `base_url` is expected to end with `/`.
pub fn manifest_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        format!("{base_url}{MANIFEST_FILE}")
    } else {
        format!("{base_url}/{MANIFEST_FILE}")
    }
}

/// Fetch and parse the remote manifest, or an empty one on any failure.
pub fn fetch_remote_manifest(fetcher: &dyn ManifestFetcher, base_url: &str) -> Manifest {
    let url = manifest_url(base_url);
    match fetcher.get(&url) {
        Ok(body) => {
            let manifest = parse_manifest(&body);
            tracing::info!("remote manifest {url}: {} entries", manifest.len());
            manifest
        }
        Err(err) => {
            tracing::warn!("remote manifest {url} unavailable ({err}); treating remote as empty");
            Manifest::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Canned {
        response: Result<String, u16>,
        requested: RefCell<Vec<String>>,
    }

    impl ManifestFetcher for Canned {
        fn get(&self, url: &str) -> Result<String, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            self.response.clone().map_err(FetchError::Status)
        }
    }

    fn canned(response: Result<String, u16>) -> Canned {
        Canned {
            response,
            requested: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn url_joins_with_single_slash() {
        assert_eq!(
            manifest_url("https://example.com/"),
            "https://example.com/digest.sha256"
        );
        assert_eq!(
            manifest_url("https://example.com/site"),
            "https://example.com/site/digest.sha256"
        );
    }

    #[test]
    fn not_found_yields_empty_manifest() {
        let fetcher = canned(Err(404));
        let manifest = fetch_remote_manifest(&fetcher, "https://example.com/");
        assert!(manifest.is_empty());
        assert_eq!(
            fetcher.requested.borrow().as_slice(),
            &["https://example.com/digest.sha256".to_string()]
        );
    }

    #[test]
    fn body_is_parsed_leniently() {
        let digest = "a".repeat(64);
        let fetcher = canned(Ok(format!("{digest}  index.html\ngarbage\n")));
        let manifest = fetch_remote_manifest(&fetcher, "https://example.com/");
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("index.html"), Some(digest.as_str()));
    }

    #[test]
    fn unreachable_host_yields_empty_manifest() {
        // Port 9 (discard) is closed on loopback in any test environment we run in.
        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        let manifest = fetch_remote_manifest(&fetcher, "http://127.0.0.1:9/");
        assert!(manifest.is_empty());
    }
}
