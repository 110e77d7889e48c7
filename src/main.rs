use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info};

use gator::config::default_config_path;
use gator::{CommandRegistry, Config, Database, GatorError, State};

/// Command-line RSS feed aggregator.
#[derive(Debug, Parser)]
#[command(name = "gator", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "GATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Command to run.
    command: String,

    /// Command arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> gator::Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);

    // Load configuration
    let mut config = Config::load_or_default(&config_path)
        .map_err(|e| GatorError::Startup(format!("failed to load {:?}: {e}", config_path)))?;
    config.apply_env_overrides();
    config.validate()?;

    // Initialize logging
    if let Err(e) = gator::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        gator::logging::init_console_only(&config.logging.level);
    }
    debug!("Using configuration at {:?}", config_path);

    let db = Database::open(&config.db_url).await?;
    let mut state = State::new(db, config, config_path);

    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            cancel.cancel();
        }
    });

    let registry = CommandRegistry::with_defaults();
    let output = registry.run(&mut state, &cli.command, &cli.args).await?;
    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}
