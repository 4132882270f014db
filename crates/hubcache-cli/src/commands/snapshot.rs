use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use hubcache::{DownloadOptions, Downloader, Progress};

use crate::config::AppConfig;

/// File-count template for snapshot downloads.
const PB_TEMPLATE_FILES: &str =
    "{wide_msg}\n[{bar:50.cyan/blue}] {pos}/{len} files  [{elapsed_precise}]";

/// Download a revision tree, keeping paths matching the include globs.
pub async fn run(
    repo: &str,
    kind: &str,
    revision: &str,
    dest: Option<&Path>,
    include: &[String],
    force: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let (kind, id) = super::parse_target(repo, kind)?;
    let cache = config.hub_cache();
    info!(%id, revision, cache = %cache.root().display(), "Downloading snapshot");

    let downloader = Downloader::new(config.hub_api()?, cache).with_retry(
        config.hub.max_retries,
        Duration::from_secs(config.hub.retry_delay_secs),
    );

    let dest = dest
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(id.name.rsplit('/').next().unwrap_or(id.name.as_str())));

    let progress = Progress::new();
    let opts = DownloadOptions {
        force,
        progress: Some(progress.clone()),
        ..Default::default()
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(PB_TEMPLATE_FILES)
            .expect("valid progress template")
            .progress_chars("##-"),
    );
    pb.set_message(id.to_string());

    let task = downloader.download_snapshot(kind, &id, revision, &dest, include, &opts);
    tokio::pin!(task);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let result = loop {
        tokio::select! {
            result = &mut task => break result,
            _ = ticker.tick() => {
                pb.set_length(progress.total());
                pb.set_position(progress.completed());
            }
        }
    };
    match &result {
        Ok(_) => pb.finish_with_message(format!("Done  {id}")),
        Err(_) => pb.abandon(),
    }
    let path = result?;

    println!(
        "Snapshot of '{id}' @ {revision} written to {}",
        path.display()
    );
    Ok(())
}
