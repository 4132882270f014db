use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cache::{relative_blob_target, normalize_etag, RepoCache};
use crate::error::HubResult;

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

impl RepoCache {
    /// Install `snapshots/<commit>/<filename>` pointing at the blob for
    /// `etag`.
    ///
    /// The entry is a relative symlink into `blobs/`; on filesystems where
    /// symlink creation fails the blob bytes are copied instead. Any existing
    /// entry is removed first, so re-linking is idempotent.
    pub fn link_snapshot(&self, commit: &str, filename: &str, etag: &str) -> HubResult<PathBuf> {
        let normalized = normalize_etag(etag)?;
        let link = self.snapshot_file(commit, filename);
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent)?;
        }
        if link.symlink_metadata().is_ok() {
            fs::remove_file(&link)?;
        }

        let target = relative_blob_target(filename, &normalized);
        match create_symlink(&target, &link) {
            Ok(()) => {
                debug!(link = %link.display(), target = %target.display(), "linked snapshot entry");
            }
            Err(e) => {
                // symlinks unsupported here: degrade to a full copy
                warn!(
                    link = %link.display(),
                    error = %e,
                    "symlink creation failed, copying blob into snapshot"
                );
                fs::copy(self.blob_path(&normalized)?, &link)?;
            }
        }
        Ok(link)
    }
}
