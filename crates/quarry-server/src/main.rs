//! Quarry CI trigger service.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod config;
mod probes;
mod server;
mod telemetry;

use config::ServerConfig;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about = "Quarry CI build trigger service", long_about = None)]
struct Cli {
    /// Configuration file (YAML or TOML). Environment variables prefixed
    /// `QUARRY_` override it.
    #[arg(short, long, env = "QUARRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the trigger API (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Print the JSON schema of work messages.
    WorkSchema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(Command::WorkSchema) = cli.command {
        let schema = quarry_core::work::work_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            let database = server::connect_database(&config).await?;
            database.migrate().await.context("Failed to run migrations")?;
            info!("Migrations applied");
            Ok(())
        }
        _ => server::run(config).await,
    };

    telemetry::shutdown();
    result
}
