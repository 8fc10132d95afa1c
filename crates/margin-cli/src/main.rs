//! Margin CLI - human review for low-confidence document extraction.

use clap::Parser;
use margin_cli::commands;
use margin_cli::{Cli, Command, Formatter, MarginConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` wins over the configured level.
fn init_tracing(config: &MarginConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run() -> margin_cli::Result<()> {
    let cli = Cli::parse();
    let config = MarginConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    let format = cli.format.map(Into::into).unwrap_or(config.output.format);
    let color_enabled = !cli.no_color && config.output.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Split(args) => commands::execute_split(args, &config, &formatter)?,
        Command::Ingest(args) => commands::execute_ingest(args, &config, &formatter)?,
        Command::Status(args) => commands::execute_status(args, &config, &formatter)?,
        Command::Worker(args) => commands::execute_worker(args, &config, &formatter).await?,
    }

    Ok(())
}
