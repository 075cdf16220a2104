//! # keyward
//!
//! Command-line front end over the Keyward session client. Stands in for the
//! login page, the OAuth callback page, and protected views: every command
//! reads and writes the same persisted token pair.

mod commands;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "keyward")]
#[command(about = "Log in, keep the session fresh, and call protected endpoints")]
#[command(version)]
struct Cli {
    /// Override the backend origin from config
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = keyward_common::config::init()?.clone();
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }

    // Initialize tracing (structured logging) on stderr; stdout carries results
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "keyward=info,keyward_client=info".into());
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!("keyward v{}", env!("CARGO_PKG_VERSION"));

    cli.command.execute(&config).await
}
