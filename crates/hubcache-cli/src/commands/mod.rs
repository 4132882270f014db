pub mod delete;
pub mod download;
pub mod list;
pub mod snapshot;

use anyhow::Context;
use hubcache::{RepoId, RepoKind};

/// Parse the `--kind` and repo-id arguments shared by every subcommand.
pub(crate) fn parse_target(repo: &str, kind: &str) -> anyhow::Result<(RepoKind, RepoId)> {
    let kind: RepoKind = kind
        .parse()
        .map_err(|e: String| anyhow::anyhow!("invalid --kind: {e}"))?;
    let id = RepoId::parse(repo).with_context(|| format!("Invalid repo id '{repo}'"))?;
    Ok((kind, id))
}
