//! # sitepush-sync
//!
//! One-directional synchronization of a rendered site to a remote store.
//!
//! [`ManifestBuilder`] digests the local output tree, [`fetch_remote_manifest`]
//! reads what the remote last published, [`plan`](plan::plan) diffs the two,
//! and [`apply`](apply::apply) uploads the difference through a
//! [`RemoteStore`]. [`pipeline::run`] chains all of it, rendering first.

pub mod apply;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod ftp;
pub mod manifest;
pub mod pipeline;
pub mod plan;
pub mod staleness;
pub mod store;
pub mod writer;

pub use apply::{apply_removals, ApplyOptions, ApplyReport};
pub use digest::MANIFEST_FILE;
pub use error::SyncError;
pub use fetch::{fetch_remote_manifest, FetchError, HttpFetcher, ManifestFetcher};
pub use ftp::{FtpConnector, FtpStore};
pub use manifest::{Manifest, ManifestBuilder};
pub use pipeline::{PushOptions, SitePlan, SitePushReport, SyncScope};
pub use plan::{ActionKind, ActionPlan, PlanCounts, TransferAction};
pub use store::{
    open_session, ConnectOptions, Connector, DirConnector, DirStore, RemoteStore,
    StandardConnector, StoreKind,
};
pub use writer::{atomic_write, render_site, RenderOptions, RenderSiteResult, WriteResult};
