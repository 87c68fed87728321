//! # Clinic Console Binary
//!
//! ## Usage
//! ```bash
//! # Defaults, platform config file and CLINIC_* environment
//! cargo run -p clinic-console
//!
//! # Explicit config file
//! cargo run -p clinic-console -- --config ./console.toml
//! ```
//! Populate a fresh database with `cargo run -p clinic-db --bin seed` first.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{stdin, stdout, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinic_console::menu::Console;
use clinic_console::{AppState, ClinicConfig};
use clinic_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = parse_args()?;
    let config = ClinicConfig::load(config_path)?;

    init_tracing(&config.logging.filter);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database.path.display(),
        "Starting clinic console"
    );

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await?;

    let state = Arc::new(AppState::new(db.clone(), config)?);

    let mut console = Console::new(state, BufReader::new(stdin()), stdout());
    console.run().await?;

    db.close().await;
    info!("Clinic console stopped");
    Ok(())
}

/// `--config <path>` is the only flag.
fn parse_args() -> Result<Option<PathBuf>, String> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("Usage: clinic-console [--config <path>]");
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    Ok(config_path)
}

/// Logs go to stderr so they never interleave with menu output on stdout.
///
/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
