use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use hubcache::{DownloadOptions, Downloader, Progress};

use crate::config::AppConfig;

/// Progress bar template for files whose total size is known.
const PB_TEMPLATE_SIZED: &str =
    "{wide_msg}\n[{bar:50.cyan/blue}] {bytes}/{total_bytes}  {bytes_per_sec}  ETA {eta}";

/// Download a single file through the shared cache.
pub async fn run(
    repo: &str,
    file: &str,
    kind: &str,
    revision: &str,
    dest: Option<&Path>,
    force: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let (kind, id) = super::parse_target(repo, kind)?;
    let cache = config.hub_cache();
    info!(%id, revision, file, cache = %cache.root().display(), "Downloading file");

    let downloader = Downloader::new(config.hub_api()?, cache).with_retry(
        config.hub.max_retries,
        Duration::from_secs(config.hub.retry_delay_secs),
    );

    let dest = dest.map(PathBuf::from).unwrap_or_else(|| {
        // basename in the current directory
        PathBuf::from(file.rsplit('/').next().unwrap_or(file))
    });

    let progress = Progress::new();
    let opts = DownloadOptions {
        force,
        progress: Some(progress.clone()),
        ..Default::default()
    };

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(PB_TEMPLATE_SIZED)
            .expect("valid progress template")
            .progress_chars("##-"),
    );
    pb.set_message(file.to_string());

    let task = downloader.download(kind, &id, revision, file, &dest, &opts);
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
        Ok(_) => pb.finish_with_message(format!("Done  {file}")),
        Err(_) => pb.abandon(),
    }
    let path = result?;

    println!("Downloaded '{file}' to {}", path.display());
    Ok(())
}
