use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;
use uuid::Uuid;

use crate::cache::RepoCache;
use crate::error::HubResult;

/// Exclusive hold on one blob's lockfile.
///
/// The advisory lock is released when the guard is dropped (the OS drops the
/// lock with the file descriptor), on every exit path.
#[derive(Debug)]
pub struct BlobGuard {
    _lock: File,
    blob_path: PathBuf,
}

impl RepoCache {
    /// Whether the blob for this etag is already materialized.
    pub fn has_blob(&self, etag: &str) -> HubResult<bool> {
        Ok(self.blob_path(etag)?.exists())
    }

    /// Acquire the exclusive advisory lock for this blob. Blocks until the
    /// lock is granted; callers needing cancellation wrap this with their own
    /// deadline.
    pub fn lock_blob(&self, etag: &str) -> HubResult<BlobGuard> {
        let lock_path = self.lock_path(etag)?;
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        lock.lock_exclusive()?;
        debug!(lock = %lock_path.display(), "acquired blob lock");
        Ok(BlobGuard { _lock: lock, blob_path: self.blob_path(etag)? })
    }

    /// Install a completed staging file as the blob for `etag`.
    pub fn install_blob_from(&self, staging: &Path, etag: &str) -> HubResult<PathBuf> {
        self.lock_blob(etag)?.install_from(staging)
    }

    /// Install raw bytes as the blob for `etag`.
    pub fn install_blob_bytes(&self, bytes: &[u8], etag: &str) -> HubResult<PathBuf> {
        self.lock_blob(etag)?.install_bytes(bytes)
    }
}

impl BlobGuard {
    pub fn blob_path(&self) -> &Path {
        &self.blob_path
    }

    pub fn blob_exists(&self) -> bool {
        self.blob_path.exists()
    }

    /// Move `staging` into place as the blob. A no-op (discarding the staging
    /// file) when the blob already exists; blobs are never rewritten.
    pub fn install_from(&self, staging: &Path) -> HubResult<PathBuf> {
        if self.blob_path.exists() {
            let _ = fs::remove_file(staging);
            debug!(blob = %self.blob_path.display(), "blob already present, discarding staging file");
            return Ok(self.blob_path.clone());
        }
        if fs::rename(staging, &self.blob_path).is_err() {
            // cross-device move: copy, flush to disk, then drop the source
            let mut src = File::open(staging)?;
            let mut dst = File::create(&self.blob_path)?;
            std::io::copy(&mut src, &mut dst)?;
            dst.sync_all()?;
            fs::remove_file(staging)?;
        }
        debug!(blob = %self.blob_path.display(), "installed blob");
        Ok(self.blob_path.clone())
    }

    /// Write `bytes` to a temp sibling, then rename into place under the lock.
    pub fn install_bytes(&self, bytes: &[u8]) -> HubResult<PathBuf> {
        if self.blob_path.exists() {
            debug!(blob = %self.blob_path.display(), "blob already present, skipping write");
            return Ok(self.blob_path.clone());
        }
        let tmp = self.blob_path.with_file_name(format!(
            "{}.{}.tmp",
            self.blob_path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4().simple()
        ));
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        if let Err(e) = fs::rename(&tmp, &self.blob_path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(blob = %self.blob_path.display(), size = bytes.len(), "installed blob from bytes");
        Ok(self.blob_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::cache::HubCache;
    use crate::repo::{RepoId, RepoKind};

    use super::*;

    fn repo_cache(root: &Path) -> RepoCache {
        HubCache::at(root).repo(RepoKind::Model, &RepoId::new("ns", "n"))
    }

    #[test]
    fn install_from_staging_moves_file() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        fs::create_dir_all(repo.blobs_dir()).unwrap();
        let staging = repo.blobs_dir().join("abc.incomplete");
        fs::write(&staging, b"payload").unwrap();

        let blob = repo.install_blob_from(&staging, "abc").unwrap();
        assert_eq!(fs::read(&blob).unwrap(), b"payload");
        assert!(!staging.exists(), "staging file must be consumed");
    }

    #[test]
    fn install_is_noop_when_blob_exists() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        fs::create_dir_all(repo.blobs_dir()).unwrap();
        let blob_path = repo.blob_path("abc").unwrap();
        fs::write(&blob_path, b"original").unwrap();

        let staging = repo.blobs_dir().join("abc.incomplete");
        fs::write(&staging, b"different").unwrap();
        let installed = repo.install_blob_from(&staging, "abc").unwrap();

        assert_eq!(fs::read(&installed).unwrap(), b"original", "blobs are never rewritten");
        assert!(!staging.exists(), "staging file must be discarded");
    }

    #[test]
    fn install_bytes_writes_through_temp_file() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        let blob = repo.install_blob_bytes(b"hello", "\"etag\"").unwrap();
        assert_eq!(fs::read(&blob).unwrap(), b"hello");
        assert_eq!(blob, repo.blob_path("etag").unwrap());
        let leftovers: Vec<_> = fs::read_dir(repo.blobs_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn has_blob_reflects_installation() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        assert!(!repo.has_blob("abc").unwrap());
        repo.install_blob_bytes(b"x", "abc").unwrap();
        assert!(repo.has_blob("abc").unwrap());
    }

    #[test]
    fn lock_is_released_on_guard_drop() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        let guard = repo.lock_blob("abc").unwrap();
        drop(guard);
        // a second acquisition must not block forever
        let again = repo.lock_blob("abc").unwrap();
        drop(again);
    }

    #[test]
    fn concurrent_installs_produce_one_blob() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        let mut handles = Vec::new();
        for i in 0..4 {
            let repo = repo.clone();
            handles.push(std::thread::spawn(move || {
                // every writer carries identical content, as identical etags imply
                let staging = repo
                    .blobs_dir()
                    .join(format!("abc.incomplete.{i}"));
                fs::create_dir_all(repo.blobs_dir()).unwrap();
                fs::write(&staging, b"same bytes").unwrap();
                repo.install_blob_from(&staging, "abc").unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(fs::read(repo.blob_path("abc").unwrap()).unwrap(), b"same bytes");
        let blobs: Vec<_> = fs::read_dir(repo.blobs_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| !n.ends_with(".lock"))
            .collect();
        assert_eq!(blobs, vec!["abc".to_string()], "exactly one blob file: {blobs:?}");
    }
}
