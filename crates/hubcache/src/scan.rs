use std::fs;
use std::io;
use std::path::Path;

use crate::cache::HubCache;
use crate::error::HubResult;
use crate::repo::{RepoId, RepoKind};

/// Inventory entry for one cached repository.
#[derive(Debug, Clone)]
pub struct CachedRepo {
    pub kind: RepoKind,
    pub id: RepoId,
    /// Snapshot directory names (commits, or verbatim revisions when the
    /// server never reported one).
    pub revisions: Vec<String>,
    /// `(ref name, commit)` pairs from the refs tree.
    pub refs: Vec<(String, String)>,
    /// Bytes held in `blobs/`.
    pub size_on_disk: u64,
}

impl HubCache {
    /// Enumerate every repository present in the cache.
    ///
    /// Unrecognized directories are skipped; a shared cache may contain
    /// entries written by other tools.
    pub fn scan(&self) -> HubResult<Vec<CachedRepo>> {
        let mut repos = Vec::new();
        let entries = match fs::read_dir(self.root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(repos),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let Some((kind, id)) = parse_repo_dir_name(&dir_name) else {
                continue;
            };
            let repo = self.repo(kind, &id);

            let mut revisions = Vec::new();
            if let Ok(snaps) = fs::read_dir(repo.snapshots_dir()) {
                for snap in snaps.filter_map(|e| e.ok()) {
                    if snap.path().is_dir() {
                        revisions.push(snap.file_name().to_string_lossy().to_string());
                    }
                }
            }
            revisions.sort();

            let mut refs = Vec::new();
            collect_refs(&repo.refs_dir(), "", &mut refs);
            refs.sort();

            repos.push(CachedRepo {
                kind,
                id,
                revisions,
                refs,
                size_on_disk: dir_size(&repo.blobs_dir()),
            });
        }
        repos.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));
        Ok(repos)
    }

    /// Delete one repository's cache directory. Returns the number of files
    /// removed.
    pub fn delete_repo(&self, kind: RepoKind, id: &RepoId) -> HubResult<usize> {
        let repo_dir = self.repo(kind, id).repo_dir().to_path_buf();
        if !repo_dir.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{kind} '{id}' is not cached under {}", self.root().display()),
            )
            .into());
        }
        let count = count_files(&repo_dir);
        fs::remove_dir_all(&repo_dir)?;
        Ok(count)
    }
}

/// Inverse of the repo directory naming: `<plural>--<slug parts…>`.
fn parse_repo_dir_name(dir_name: &str) -> Option<(RepoKind, RepoId)> {
    let mut parts = dir_name.split("--");
    let kind = match parts.next()? {
        "models" => RepoKind::Model,
        "datasets" => RepoKind::Dataset,
        "spaces" => RepoKind::Space,
        _ => return None,
    };
    let rest: Vec<&str> = parts.collect();
    if rest.len() < 2 || rest.iter().any(|p| p.is_empty()) {
        return None;
    }
    RepoId::parse(&rest.join("/")).ok().map(|id| (kind, id))
}

fn collect_refs(dir: &Path, prefix: &str, out: &mut Vec<(String, String)>) {
    let Ok(entries) = fs::read_dir(dir) else { return };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        let qualified = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
        let path = entry.path();
        if path.is_dir() {
            collect_refs(&path, &qualified, out);
        } else if let Ok(contents) = fs::read_to_string(&path) {
            let commit = contents.trim();
            if !commit.is_empty() {
                out.push((qualified, commit.to_string()));
            }
        }
    }
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else { return 0 };
    entries
        .filter_map(|e| e.ok())
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                e.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else { return 0 };
    entries
        .filter_map(|e| e.ok())
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}
