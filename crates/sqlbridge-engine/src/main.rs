//! `sqlbridge` - serves the data engine over stdin/stdout
//!
//! ```bash
//! # Requests in, responses and events out, logs on stderr
//! echo '{"id":1,"method":"listSchemas","params":{"descriptor":{...}}}' | sqlbridge
//!
//! # Custom config, no log files
//! sqlbridge --config ./engine.toml --no-file-logs
//! ```

use anyhow::Context;
use clap::Parser;
use sqlbridge_engine::logging::{self, LoggingConfig};
use sqlbridge_engine::{DataEngine, EngineConfig, bridge};
use std::path::PathBuf;
use std::sync::Arc;

/// Database access engine speaking newline-delimited JSON on stdio
#[derive(Parser, Debug)]
#[command(name = "sqlbridge")]
#[command(version)]
#[command(about = "Streaming queries, introspection and migrations over stdio", long_about = None)]
struct Cli {
    /// Engine config file (defaults to <config dir>/sqlbridge/engine.toml)
    #[arg(short = 'c', long = "config", env = "SQLBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info,sqlbridge_engine=debug")
    #[arg(long = "log-filter")]
    log_filter: Option<String>,

    /// Log to stderr only
    #[arg(long = "no-file-logs")]
    no_file_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging_config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };
    if let Some(filter) = cli.log_filter {
        logging_config = logging_config.with_filter(filter);
    }
    if cli.no_file_logs {
        logging_config = logging_config.with_json_logs(false);
    }
    logging::init(logging_config).context("Failed to initialize logging")?;

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load_or_default(),
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_dir = %logging::log_directory().display(),
        "Starting sqlbridge"
    );

    let engine = Arc::new(DataEngine::new(config).context("Invalid engine configuration")?);
    bridge::serve(engine, tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("Bridge stopped")?;

    tracing::info!("sqlbridge exiting");
    Ok(())
}
