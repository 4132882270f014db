use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use glob::{MatchOptions, Pattern};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{HubApi, TreeEntryKind};
use crate::blob::BlobGuard;
use crate::cache::{normalize_etag, HubCache, RepoCache};
use crate::error::{HubError, HubResult};
use crate::progress::Progress;
use crate::repo::{is_commit_hash, RepoId, RepoKind};

/// Buffered write granularity for streaming downloads.
const WRITE_BUFFER: usize = 64 * 1024;
/// Minimum interval between throughput recomputations.
const THROUGHPUT_INTERVAL: Duration = Duration::from_millis(100);

/// Per-call download options.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Re-fetch even when the snapshot entry is already cached.
    pub force: bool,
    /// Prefer a background-capable transfer where the platform has one.
    /// Semantics are otherwise identical.
    pub in_background: bool,
    /// Observer mutated in place as bytes arrive.
    pub progress: Option<Progress>,
    /// Cooperative cancellation signal; checked at every suspension point.
    pub cancel: CancellationToken,
}

/// Resumable download engine over a hub API client and a shared cache.
#[derive(Debug, Clone)]
pub struct Downloader {
    api: HubApi,
    cache: HubCache,
    max_retries: u32,
    retry_delay: Duration,
}

impl Downloader {
    pub fn new(api: HubApi, cache: HubCache) -> Self {
        Self { api, cache, max_retries: 3, retry_delay: Duration::from_secs(1) }
    }

    /// Override the retry bound and inter-attempt delay.
    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn cache(&self) -> &HubCache {
        &self.cache
    }

    pub fn api(&self) -> &HubApi {
        &self.api
    }

    /// Download one file into `destination`, going through the shared cache.
    ///
    /// On success `destination` holds the file bytes, the blob is installed
    /// under `blobs/`, the snapshot entry exists, and for symbolic revisions
    /// the ref file records the observed commit. Transient failures are
    /// retried up to the configured bound; cancellation leaves a resumable
    /// staging file behind.
    pub async fn download(
        &self,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
        filename: &str,
        destination: &Path,
        opts: &DownloadOptions,
    ) -> HubResult<PathBuf> {
        let repo_cache = self.cache.repo(kind, id);

        if !opts.force {
            if let Some(commit) = repo_cache.resolve_revision(revision) {
                let snapshot = repo_cache.snapshot_file(&commit, filename);
                if snapshot.exists() {
                    debug!(%id, revision, filename, "cache hit, copying out");
                    let len = deliver(&snapshot, destination)?;
                    finish_progress(&opts.progress, len);
                    return Ok(destination.to_path_buf());
                }
            }
        }
        if opts.in_background {
            debug!(filename, "background transfer requested; foreground engine handles it");
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .fetch_and_install(&repo_cache, kind, id, revision, filename, destination, opts)
                .await
            {
                Ok(path) => return Ok(path),
                Err(e) if !e.is_retryable() || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "download attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = opts.cancel.cancelled() => return Err(HubError::Cancelled),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }

    /// One probe → stream → verify → promote pass.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_and_install(
        &self,
        repo_cache: &RepoCache,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
        filename: &str,
        destination: &Path,
        opts: &DownloadOptions,
    ) -> HubResult<PathBuf> {
        let probe = tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => return Err(HubError::Cancelled),
            probe = self.api.probe_file(kind, id, revision, filename) => probe?,
        };
        if !probe.exists {
            return Err(HubError::NotFound);
        }

        // The snapshot directory is named after the observed commit; a
        // commit-shaped revision stands in when the server does not say.
        let commit = probe
            .commit
            .clone()
            .or_else(|| is_commit_hash(revision).then(|| revision.to_string()))
            .unwrap_or_else(|| revision.to_string());
        let etag = match probe.etag.as_deref() {
            Some(raw) => normalize_etag(raw)?,
            None => {
                warn!(filename, "no etag on probe response, staging under a unique token");
                format!("tmp-{}", Uuid::new_v4().simple())
            }
        };

        // The lock covers both the staging file and blob installation, so at
        // most one process streams a given blob at a time. A late arrival
        // blocks here, then finds the blob installed and skips the transfer.
        let guard = lock_blob_cancellable(repo_cache, &etag, &opts.cancel).await?;

        if guard.blob_exists() && !opts.force {
            debug!(etag, "blob already installed, linking snapshot only");
            let snapshot = repo_cache.link_snapshot(&commit, filename, &etag)?;
            self.record_ref(repo_cache, revision, probe.commit.as_deref());
            drop(guard);
            let len = deliver(&snapshot, destination)?;
            finish_progress(&opts.progress, len);
            return Ok(destination.to_path_buf());
        }

        let incomplete = repo_cache.incomplete_path(&etag)?;
        let expected = probe.size;
        let mut resume_offset = match fs::metadata(&incomplete) {
            Ok(m) if m.len() > 0 && expected.map_or(true, |e| m.len() < e) => m.len(),
            _ => 0,
        };
        if resume_offset > 0 {
            info!(filename, resume_offset, "resuming interrupted download");
        }

        let resp = tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => return Err(HubError::Cancelled),
            resp = self.api.fetch_file(kind, id, revision, filename, resume_offset) => resp?,
        };
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            // server ignored (or never saw) the range: restart from zero
            resume_offset = 0;
        }

        let file = if resume_offset > 0 {
            OpenOptions::new().append(true).open(&incomplete)?
        } else {
            File::create(&incomplete)?
        };
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER, file);
        let mut written = resume_offset;
        let mut last_tick = Instant::now();
        let mut bytes_since_tick = 0u64;
        if let Some(p) = &opts.progress {
            if let Some(total) = expected {
                p.set_total(total);
            }
            p.set_completed(written);
        }

        let mut stream = resp.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = opts.cancel.cancelled() => {
                    // keep what we have: a future call resumes from here
                    writer.flush()?;
                    return Err(HubError::Cancelled);
                }
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            writer.write_all(&chunk)?;
            written += chunk.len() as u64;
            bytes_since_tick += chunk.len() as u64;
            if let Some(p) = &opts.progress {
                p.set_completed(written);
                let elapsed = last_tick.elapsed();
                if elapsed >= THROUGHPUT_INTERVAL {
                    p.set_throughput(bytes_since_tick as f64 / elapsed.as_secs_f64());
                    last_tick = Instant::now();
                    bytes_since_tick = 0;
                }
            }
        }
        writer.flush()?;
        drop(writer);

        if let Some(expected) = expected {
            if written != expected {
                return Err(HubError::SizeMismatch { expected, written });
            }
        }

        // Promotion failures are soft: the fetched bytes still reach the
        // caller, and the staging file stays behind for a later repair.
        let delivery = match guard.install_from(&incomplete) {
            Ok(blob) => match repo_cache.link_snapshot(&commit, filename, &etag) {
                Ok(snapshot) => {
                    self.record_ref(repo_cache, revision, probe.commit.as_deref());
                    snapshot
                }
                Err(e) => {
                    warn!(error = %e, "snapshot entry failed, delivering from blob");
                    blob
                }
            },
            Err(e) => {
                warn!(error = %e, "blob install failed, delivering from staging file");
                incomplete.clone()
            }
        };
        drop(guard);

        let len = deliver(&delivery, destination)?;
        finish_progress(&opts.progress, len);
        debug!(filename, written, "download complete");
        Ok(destination.to_path_buf())
    }

    fn record_ref(&self, repo_cache: &RepoCache, revision: &str, observed_commit: Option<&str>) {
        let Some(commit) = observed_commit else { return };
        if is_commit_hash(revision) || revision == commit {
            return;
        }
        if let Err(e) = repo_cache.write_ref(revision, commit) {
            warn!(revision, error = %e, "failed to update ref");
        }
    }

    /// Download every file of a revision matching `globs` into
    /// `destination`, preserving tree paths.
    ///
    /// An empty glob list keeps everything. Files are fetched one at a time
    /// so the outer progress stays ordered; each file contributes one unit.
    /// Cancellation between files returns early without error.
    pub async fn download_snapshot(
        &self,
        kind: RepoKind,
        id: &RepoId,
        revision: &str,
        destination: &Path,
        globs: &[String],
        opts: &DownloadOptions,
    ) -> HubResult<PathBuf> {
        let patterns = compile_globs(globs)?;
        // cancellation anywhere in a snapshot download is an early return,
        // not an error
        let entries = tokio::select! {
            biased;
            _ = opts.cancel.cancelled() => return Ok(destination.to_path_buf()),
            entries = self.api.list_tree(kind, id, revision) => entries?,
        };
        let files: Vec<_> = entries
            .into_iter()
            .filter(|e| e.kind == TreeEntryKind::File)
            .filter(|e| matches_any(&patterns, &e.path))
            .collect();
        info!(%id, revision, count = files.len(), "downloading snapshot");
        if let Some(p) = &opts.progress {
            p.set_total(files.len() as u64);
        }

        for entry in &files {
            if opts.cancel.is_cancelled() {
                info!("snapshot download cancelled, returning early");
                return Ok(destination.to_path_buf());
            }
            let file_dest = destination.join(&entry.path);
            let file_opts = DownloadOptions {
                force: opts.force,
                in_background: opts.in_background,
                progress: None,
                cancel: opts.cancel.clone(),
            };
            match self.download(kind, id, revision, &entry.path, &file_dest, &file_opts).await {
                Ok(_) => {
                    if let Some(p) = &opts.progress {
                        p.add_completed(1);
                    }
                }
                Err(HubError::Cancelled) => return Ok(destination.to_path_buf()),
                Err(e) => return Err(e),
            }
        }
        Ok(destination.to_path_buf())
    }
}

/// Copy resolved bytes (symlinks dereferenced) to `destination`, creating
/// parent directories on demand.
fn deliver(source: &Path, destination: &Path) -> HubResult<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::copy(source, destination)?)
}

fn finish_progress(progress: &Option<Progress>, len: u64) {
    if let Some(p) = progress {
        p.set_total(len.max(p.total()));
        p.set_completed(len);
    }
}

/// Acquire a blob lock off the async runtime, honoring cancellation. The
/// blocking acquisition keeps running detached when abandoned; its guard
/// drops (and releases the lock) as soon as it is granted.
async fn lock_blob_cancellable(
    repo_cache: &RepoCache,
    etag: &str,
    cancel: &CancellationToken,
) -> HubResult<BlobGuard> {
    let repo_cache = repo_cache.clone();
    let etag = etag.to_string();
    let handle = tokio::task::spawn_blocking(move || repo_cache.lock_blob(&etag));
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HubError::Cancelled),
        joined = handle => match joined {
            Ok(result) => result,
            Err(e) => Err(HubError::Io(std::io::Error::other(e.to_string()))),
        },
    }
}

/// POSIX filename-match semantics: `*` and `?` never cross `/`, `**` is not
/// special (a run of stars collapses to one), character classes apply.
fn match_options() -> MatchOptions {
    let mut options = MatchOptions::new();
    options.require_literal_separator = true;
    options
}

fn compile_globs(globs: &[String]) -> HubResult<Vec<Pattern>> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(&collapse_star_runs(g)).map_err(|_| HubError::InvalidGlob(g.clone()))
        })
        .collect()
}

fn collapse_star_runs(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev_star = false;
    for c in pattern.chars() {
        if c == '*' && prev_star {
            continue;
        }
        prev_star = c == '*';
        out.push(c);
    }
    out
}

fn matches_any(patterns: &[Pattern], path: &str) -> bool {
    patterns.is_empty() || patterns.iter().any(|p| p.matches_with(path, match_options()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn compiled(globs: &[&str]) -> Vec<Pattern> {
        compile_globs(&globs.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn empty_glob_list_matches_everything() {
        let patterns = compiled(&[]);
        assert!(matches_any(&patterns, "config.json"));
        assert!(matches_any(&patterns, "deep/nested/file.bin"));
    }

    #[test]
    fn star_does_not_cross_separators() {
        let patterns = compiled(&["*.safetensors"]);
        assert!(matches_any(&patterns, "model.safetensors"));
        assert!(!matches_any(&patterns, "sub/model.safetensors"));
    }

    #[test]
    fn double_star_is_not_special() {
        let patterns = compiled(&["**.safetensors"]);
        assert!(matches_any(&patterns, "model.safetensors"));
        assert!(!matches_any(&patterns, "sub/model.safetensors"));
    }

    #[test]
    fn question_mark_matches_single_character() {
        let patterns = compiled(&["file.?"]);
        assert!(matches_any(&patterns, "file.a"));
        assert!(!matches_any(&patterns, "file.ab"));
    }

    #[test]
    fn character_classes_apply() {
        let patterns = compiled(&["shard-[0-9].bin"]);
        assert!(matches_any(&patterns, "shard-3.bin"));
        assert!(!matches_any(&patterns, "shard-x.bin"));
    }

    #[test]
    fn any_of_several_globs_suffices() {
        let patterns = compiled(&["*.json", "*.txt"]);
        assert!(matches_any(&patterns, "config.json"));
        assert!(matches_any(&patterns, "notes.txt"));
        assert!(!matches_any(&patterns, "weights.bin"));
    }

    #[test]
    fn explicit_path_glob_matches_nested_file() {
        let patterns = compiled(&["sub/*.safetensors"]);
        assert!(matches_any(&patterns, "sub/model.safetensors"));
        assert!(!matches_any(&patterns, "model.safetensors"));
    }

    #[test]
    fn collapse_star_runs_rewrites_only_stars() {
        assert_eq!(collapse_star_runs("**.json"), "*.json");
        assert_eq!(collapse_star_runs("a/**/b"), "a/*/b");
        assert_eq!(collapse_star_runs("plain"), "plain");
        assert_eq!(collapse_star_runs("*a**b***"), "*a*b*");
    }

    #[test]
    fn deliver_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"bytes").unwrap();
        let dest = dir.path().join("deep/nested/out.bin");
        let len = deliver(&src, &dest).unwrap();
        assert_eq!(len, 5);
        assert_eq!(fs::read(&dest).unwrap(), b"bytes");
    }

    #[cfg(unix)]
    #[test]
    fn deliver_copies_resolved_bytes_not_the_link() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target.bin");
        fs::write(&target, b"resolved").unwrap();
        let link = dir.path().join("link.bin");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let dest = dir.path().join("out.bin");
        deliver(&link, &dest).unwrap();
        assert!(!dest.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(fs::read(&dest).unwrap(), b"resolved");
    }
}
