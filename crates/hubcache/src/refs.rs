use std::fs;
use std::path::PathBuf;

use tracing::debug;
use uuid::Uuid;

use crate::cache::RepoCache;
use crate::error::HubResult;
use crate::repo::is_commit_hash;

impl RepoCache {
    fn ref_path(&self, reference: &str) -> PathBuf {
        self.refs_dir().join(reference)
    }

    /// Read `refs/<reference>` and return the trimmed commit hash.
    ///
    /// Any I/O failure (including a missing file) reads as "no such ref".
    pub fn read_ref(&self, reference: &str) -> Option<String> {
        let contents = fs::read_to_string(self.ref_path(reference)).ok()?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Write `refs/<reference> = commit` atomically (temp sibling + rename).
    ///
    /// Nested refs such as `refs/pr/5` get their parent directories created.
    pub fn write_ref(&self, reference: &str, commit: &str) -> HubResult<()> {
        let path = self.ref_path(reference);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_file_name(format!(
            "{}.{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4().simple()
        ));
        fs::write(&tmp, commit)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(reference, commit, "wrote ref");
        Ok(())
    }

    /// Resolve a revision to a commit hash: commit-shaped strings resolve to
    /// themselves, anything else goes through the ref file.
    pub fn resolve_revision(&self, revision: &str) -> Option<String> {
        if is_commit_hash(revision) {
            return Some(revision.to_string());
        }
        self.read_ref(revision)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::cache::HubCache;
    use crate::repo::{RepoId, RepoKind};

    use super::*;

    const COMMIT: &str = "1111111111111111111111111111111111111111";

    fn repo_cache(root: &std::path::Path) -> RepoCache {
        HubCache::at(root).repo(RepoKind::Model, &RepoId::new("ns", "n"))
    }

    #[test]
    fn read_missing_ref_is_none() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        assert_eq!(repo.read_ref("main"), None);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        repo.write_ref("main", COMMIT).unwrap();
        assert_eq!(repo.read_ref("main").as_deref(), Some(COMMIT));
    }

    #[test]
    fn read_trims_surrounding_whitespace() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        fs::create_dir_all(repo.refs_dir()).unwrap();
        fs::write(repo.refs_dir().join("main"), format!("  {COMMIT}\n")).unwrap();
        assert_eq!(repo.read_ref("main").as_deref(), Some(COMMIT));
    }

    #[test]
    fn nested_refs_create_parents() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        repo.write_ref("refs/pr/5", COMMIT).unwrap();
        assert_eq!(repo.read_ref("refs/pr/5").as_deref(), Some(COMMIT));
    }

    #[test]
    fn write_overwrites_existing_ref() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        repo.write_ref("main", COMMIT).unwrap();
        let other = "2222222222222222222222222222222222222222";
        repo.write_ref("main", other).unwrap();
        assert_eq!(repo.read_ref("main").as_deref(), Some(other));
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        repo.write_ref("main", COMMIT).unwrap();
        let leftovers: Vec<_> = fs::read_dir(repo.refs_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files should be renamed away");
    }

    #[test]
    fn resolve_commit_shaped_revision_is_identity() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        assert_eq!(repo.resolve_revision(COMMIT).as_deref(), Some(COMMIT));
    }

    #[test]
    fn resolve_symbolic_revision_reads_ref_file() {
        let dir = tempdir().unwrap();
        let repo = repo_cache(dir.path());
        assert_eq!(repo.resolve_revision("main"), None);
        repo.write_ref("main", COMMIT).unwrap();
        assert_eq!(repo.resolve_revision("main").as_deref(), Some(COMMIT));
    }
}
