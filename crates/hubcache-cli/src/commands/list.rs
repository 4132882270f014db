use crate::config::AppConfig;

/// List all repositories stored in the local cache.
pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let cache = config.hub_cache();
    let repos = cache.scan()?;

    if repos.is_empty() {
        println!("No repositories cached in {}.", cache.root().display());
        println!("Use `hubcache download <repo> <file>` to fetch one.");
        return Ok(());
    }

    println!("{:<10} {:<45} {:<12} REVISIONS", "KIND", "REPO ID", "SIZE");
    println!("{}", "-".repeat(90));
    for repo in &repos {
        println!(
            "{:<10} {:<45} {:<12} {}",
            repo.kind.to_string(),
            repo.id.to_string(),
            human_size(repo.size_on_disk),
            repo.revisions.join(", ")
        );
    }
    println!("\n{} repo(s) cached in {}", repos.len(), cache.root().display());

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
