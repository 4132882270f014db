use crate::config::AppConfig;

/// Remove a cached repository from local storage.
pub fn run(repo: &str, kind: &str, config: &AppConfig) -> anyhow::Result<()> {
    let (kind, id) = super::parse_target(repo, kind)?;
    let cache = config.hub_cache();

    let count = cache.delete_repo(kind, &id)?;

    println!(
        "Deleted {kind} '{id}' — {count} file(s) removed from {}",
        cache.root().display()
    );

    Ok(())
}
