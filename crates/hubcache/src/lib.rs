//! # hubcache
//!
//! A shared, content-addressed cache and resumable download engine for
//! Hugging Face–style model hubs. The on-disk layout is bit-compatible with
//! the reference ecosystem's cache, so every client on a machine reuses the
//! same blobs:
//!
//! ```text
//! <root>/models--ns--name/
//!     blobs/<etag>                the only byte-bearing copy
//!     refs/<ref>                  symbolic ref → commit hash
//!     snapshots/<commit>/<file>   symlink into blobs/ (or copy fallback)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hubcache::{DownloadOptions, Downloader, HubApi, HubCache, RepoId, RepoKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hubcache::HubError> {
//!     let downloader = Downloader::new(HubApi::from_env()?, HubCache::from_env());
//!     let dest = std::path::Path::new("config.json");
//!     downloader
//!         .download(
//!             RepoKind::Model,
//!             &RepoId::parse("mistralai/Mistral-7B-v0.1")?,
//!             "main",
//!             "config.json",
//!             dest,
//!             &DownloadOptions::default(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod blob;
pub mod cache;
pub mod download;
pub mod error;
pub mod progress;
pub mod refs;
pub mod repo;
pub mod scan;
pub mod snapshot;

pub use api::{CommitOperation, FileProbe, HubApi, HubApiBuilder, TreeEntry, TreeEntryKind};
pub use blob::BlobGuard;
pub use cache::{cache_root, normalize_etag, HubCache, RepoCache};
pub use download::{DownloadOptions, Downloader};
pub use error::{HubError, HubResult};
pub use progress::Progress;
pub use repo::{is_commit_hash, RepoId, RepoKind};
pub use scan::CachedRepo;
