use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{CliOverrides, Config, ENV_COOKIE};
use crate::scrape_data::{check_session, StoreClient};

mod analysis;
mod charts;
mod collect;
mod config;
mod export;
mod prepare_dataset;
mod preprocess;
mod report;
mod review;
mod scrape_data;
mod tf_idf;

#[derive(Parser, Debug)]
#[command(
    name = "review-miner",
    version,
    about = "Collect App Store Connect reviews and mine them for keywords"
)]
struct Cli {
    /// TOML config file (defaults to ./review-miner.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch reviews and save them as JSON and CSV
    Collect {
        /// Raw `Cookie` header copied from a logged-in browser session
        #[arg(long, env = ENV_COOKIE, hide_env_values = true)]
        cookie: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Extract keywords from saved reviews and render charts and a report
    Analyze {
        /// Review file to analyze instead of the newest combined file
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        top_k: Option<usize>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_collect(config: &Config) -> Result<()> {
    check_session(&config.session, Utc::now())?;

    let client = StoreClient::new(&config.store, &config.session)?;
    let timestamp = collect::run_timestamp();
    let summary = collect::collect_reviews(&client, &config.collect, &timestamp)?;
    for (label, count) in &summary.reviews_per_query {
        info!(%label, count, "reviews saved");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = match &cli.command {
        Command::Collect {
            cookie,
            limit,
            output_dir,
        } => CliOverrides {
            cookie: cookie.clone(),
            limit: *limit,
            collect_output_dir: output_dir.clone(),
            ..Default::default()
        },
        Command::Analyze {
            output_dir, top_k, ..
        } => CliOverrides {
            analyze_output_dir: output_dir.clone(),
            top_k: *top_k,
            ..Default::default()
        },
    };
    let config = Config::load(cli.config.as_deref(), Some(&overrides))?;

    match &cli.command {
        Command::Collect { .. } => run_collect(&config),
        Command::Analyze { input, .. } => {
            analysis::run_analysis(&config.analyze, input.as_deref())?;
            Ok(())
        }
    }
}
