use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use config::load_config;

/// hubcache — shared hub cache and resumable downloader
#[derive(Debug, Parser)]
#[command(name = "hubcache", version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Path to a custom configuration file (TOML).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log format: "pretty" (default) or "json".
    #[arg(long, global = true, default_value = "pretty", value_name = "FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download a single file from a hub repository.
    Download {
        /// Repository id (e.g. `mistralai/Mistral-7B-v0.1`).
        repo: String,

        /// File path inside the repository (e.g. `config.json`).
        file: String,

        /// Repository kind: model, dataset, or space.
        #[arg(long, default_value = "model")]
        kind: String,

        /// Branch, tag, PR ref, or 40-hex commit hash.
        #[arg(long, default_value = "main")]
        revision: String,

        /// Where to place the file. Defaults to the file's basename in the
        /// current directory.
        #[arg(long, value_name = "PATH")]
        dest: Option<PathBuf>,

        /// Re-fetch even when the file is already cached.
        #[arg(long)]
        force: bool,
    },

    /// Download a whole revision tree (optionally filtered by globs).
    Snapshot {
        /// Repository id (e.g. `mistralai/Mistral-7B-v0.1`).
        repo: String,

        /// Repository kind: model, dataset, or space.
        #[arg(long, default_value = "model")]
        kind: String,

        /// Branch, tag, PR ref, or 40-hex commit hash.
        #[arg(long, default_value = "main")]
        revision: String,

        /// Output directory. Defaults to the repository name.
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Keep only paths matching these globs (`*`, `?`, character
        /// classes; `*` does not cross `/`). Repeatable; empty keeps all.
        #[arg(long = "include", value_name = "GLOB")]
        include: Vec<String>,

        /// Re-fetch files even when they are already cached.
        #[arg(long)]
        force: bool,
    },

    /// List repositories stored in the local cache.
    List,

    /// Delete a repository from the local cache.
    Delete {
        /// Repository id to delete (e.g. `mistralai/Mistral-7B-v0.1`).
        repo: String,

        /// Repository kind: model, dataset, or space.
        #[arg(long, default_value = "model")]
        kind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_format);

    let cfg = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Download { repo, file, kind, revision, dest, force } => {
            commands::download::run(&repo, &file, &kind, &revision, dest.as_deref(), force, &cfg)
                .await?;
        }
        Commands::Snapshot { repo, kind, revision, dest, include, force } => {
            commands::snapshot::run(&repo, &kind, &revision, dest.as_deref(), &include, force, &cfg)
                .await?;
        }
        Commands::List => {
            commands::list::run(&cfg)?;
        }
        Commands::Delete { repo, kind } => {
            commands::delete::run(&repo, &kind, &cfg)?;
        }
    }

    Ok(())
}

fn init_tracing(log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(fmt::layer().json())
            .init();
    } else {
        registry
            .with(fmt::layer().pretty())
            .init();
    }
}
