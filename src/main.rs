//! k6provider - custom k6 binaries on demand
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use k6provider::cli::{Cli, Commands};
use k6provider::config::ConfigManager;
use k6provider::error::ProviderResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ProviderResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("k6provider=warn"),
        1 => EnvFilter::new("k6provider=info"),
        _ => EnvFilter::new("k6provider=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time();
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    match cli.command {
        Commands::Binary(args) => {
            k6provider::cli::commands::binary(args, &config, cli.bin_dir).await
        }
        Commands::Cache(args) => k6provider::cli::commands::cache(args, &config, cli.bin_dir).await,
        Commands::Config(args) => k6provider::cli::commands::config(args, &config, &manager).await,
    }
}
