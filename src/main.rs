use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use csvcombine::config::RuntimeConfig;
use csvcombine::init::{init_storage, init_tracing};
use csvcombine::job::{run_logged, today};
use csvcombine::schedule::run_scheduled;
use std::path::PathBuf;
use std::process::ExitCode;

/// Merge each day's per-machine CSV files into one combined CSV per directory
#[derive(Parser)]
#[command(name = "csvcombine")]
#[command(version)]
#[command(about = "Merge each day's per-machine CSV files into one combined CSV per directory", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Combine one day's partition and exit
    Run {
        /// Partition date (defaults to today on the configured clock)
        #[arg(short, long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,

        /// Exit non-zero if discovery or any directory failed
        #[arg(long)]
        strict: bool,
    },
    /// Run daily at the configured time until interrupted
    Schedule,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<ExitCode> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    init_tracing(&config.log);
    let store = init_storage(&config.storage)?;
    let options = config.combine.options();

    match cli.command {
        Command::Run { date, strict } => {
            let date = date.unwrap_or_else(|| today(config.schedule.timezone));
            let status = run_logged(store.as_ref(), date, &options).await;
            if strict && !status.is_success() {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Schedule => {
            run_scheduled(store, &config.schedule, &options).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
