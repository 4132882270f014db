use std::path::{Path, PathBuf};

use crate::error::{HubError, HubResult};
use crate::repo::{RepoId, RepoKind};

/// Environment variable naming the cache root directly.
pub const ENV_HUB_CACHE: &str = "HF_HUB_CACHE";
/// Environment variable naming the base directory; the cache lives in `hub/`.
pub const ENV_HF_HOME: &str = "HF_HOME";

const INCOMPLETE_SUFFIX: &str = ".incomplete";
const LOCK_SUFFIX: &str = ".lock";

/// Resolve the cache root from the environment.
///
/// Precedence: `HF_HUB_CACHE` → `HF_HOME`/hub → `~/.cache/huggingface/hub`.
/// The path is only computed here, never created.
pub fn cache_root() -> PathBuf {
    cache_root_from(
        std::env::var(ENV_HUB_CACHE).ok(),
        std::env::var(ENV_HF_HOME).ok(),
        dirs::home_dir(),
    )
}

fn cache_root_from(
    hub_cache: Option<String>,
    hf_home: Option<String>,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = hub_cache.filter(|v| !v.is_empty()) {
        return expand_tilde(Path::new(&dir));
    }
    if let Some(base) = hf_home.filter(|v| !v.is_empty()) {
        return expand_tilde(Path::new(&base)).join("hub");
    }
    match home {
        Some(h) => h.join(".cache").join("huggingface").join("hub"),
        None => PathBuf::from("~/.cache/huggingface/hub"),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }
    path.to_path_buf()
}

/// Normalize a server etag into a blob filename.
///
/// One leading `W/` (weak validator marker) is stripped, then all leading and
/// trailing double quotes. Empty results are rejected.
pub fn normalize_etag(etag: &str) -> HubResult<String> {
    let stripped = etag.strip_prefix("W/").unwrap_or(etag);
    let stripped = stripped.trim_matches('"');
    if stripped.is_empty() {
        return Err(HubError::InvalidEtag(etag.to_string()));
    }
    Ok(stripped.to_string())
}

/// Relative symlink target from `snapshots/<commit>/<filename>` back to the
/// blob: one `../` per path component after `snapshots`, then `blobs/<etag>`.
pub fn relative_blob_target(filename: &str, normalized_etag: &str) -> PathBuf {
    let depth = filename.split('/').filter(|c| !c.is_empty()).count();
    let mut target = PathBuf::new();
    // the commit directory itself counts as one level
    for _ in 0..depth + 1 {
        target.push("..");
    }
    target.push("blobs");
    target.push(normalized_etag);
    target
}

/// Handle on a cache root. Only computes paths; directories are created on
/// demand by the operations that write under them.
#[derive(Debug, Clone)]
pub struct HubCache {
    root: PathBuf,
}

impl HubCache {
    /// Cache rooted at the environment-resolved location.
    pub fn from_env() -> Self {
        Self { root: cache_root() }
    }

    /// Cache rooted at an explicit directory (tilde-expanded).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: expand_tilde(&root.into()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-repo view of the cache.
    pub fn repo(&self, kind: RepoKind, id: &RepoId) -> RepoCache {
        RepoCache {
            repo_dir: self.root.join(format!("{}--{}", kind.plural(), id.slug())),
        }
    }
}

/// Path computation and cache operations for one `(kind, repo)` pair.
///
/// Layout under the repo directory:
///
/// ```text
/// blobs/<etag>               the only byte-bearing copy
/// blobs/<etag>.incomplete    in-progress staging file
/// blobs/<etag>.lock          advisory lockfile
/// refs/<ref>                 symbolic ref → commit hash
/// snapshots/<commit>/<file>  symlink into blobs/ (or copy fallback)
/// ```
#[derive(Debug, Clone)]
pub struct RepoCache {
    repo_dir: PathBuf,
}

impl RepoCache {
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.repo_dir.join("blobs")
    }

    pub fn refs_dir(&self) -> PathBuf {
        self.repo_dir.join("refs")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.repo_dir.join("snapshots")
    }

    /// Blob path for a (possibly unnormalized) etag.
    pub fn blob_path(&self, etag: &str) -> HubResult<PathBuf> {
        Ok(self.blobs_dir().join(normalize_etag(etag)?))
    }

    /// Staging path for an in-progress download of this blob.
    pub fn incomplete_path(&self, etag: &str) -> HubResult<PathBuf> {
        Ok(self.blobs_dir().join(format!("{}{}", normalize_etag(etag)?, INCOMPLETE_SUFFIX)))
    }

    /// Lockfile guarding materialization of this blob.
    pub fn lock_path(&self, etag: &str) -> HubResult<PathBuf> {
        Ok(self.blobs_dir().join(format!("{}{}", normalize_etag(etag)?, LOCK_SUFFIX)))
    }

    pub fn snapshot_dir(&self, commit: &str) -> PathBuf {
        self.snapshots_dir().join(commit)
    }

    /// Snapshot entry path; `filename` may contain `/` separators.
    pub fn snapshot_file(&self, commit: &str, filename: &str) -> PathBuf {
        self.snapshot_dir(commit).join(filename)
    }
}
