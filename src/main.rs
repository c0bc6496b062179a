use anyhow::{Context, Result};
use clap::Parser;
use linkedin_agent::cli::{handle_command, AgentCli};
use linkedin_agent::core::ConfigManager;
use std::fs::OpenOptions;
use std::process::ExitCode;
use tracing::{error, info};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match std::env::var("AGENT_LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true) // Clear file on startup
                .open(path.trim())
                .with_context(|| format!("Failed to open log file {}", path))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(true)
                    .with_span_list(false),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = AgentCli::parse();

    if let Err(e) = init_logging() {
        eprintln!("❌ Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    let config = match ConfigManager::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!("❌ Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.ensure_directories().await {
        eprintln!("❌ {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Database: {}", config.database_path.display());

    match handle_command(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
