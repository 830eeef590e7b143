// TiaBridge query engine
// Main entry point for the tiabridge binary

use clap::Parser;
use tiabridge_engine::cli::{Cli, Command};
use tiabridge_engine::config::Config;
use tiabridge_engine::handlers::{
    handle_ask, handle_catalog, handle_doctor, handle_serve, OutputFormat,
};
use tiabridge_engine::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };
    config.validate()?;

    init_telemetry(cli.log.as_deref(), &config.core.log_level);

    tracing::info!("TiaBridge v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve => handle_serve(&config).await,
        Command::Ask { question } => handle_ask(question, &config, format).await,
        Command::Catalog => handle_catalog(format),
        Command::Doctor => handle_doctor(&config, format).await,
    }
}
