//! # Knockd entry point
//!
//! Startup sequence:
//!
//! 1. Initialize tracing (RUST_LOG controls the filter)
//! 2. Load configuration (defaults → TOML file → environment)
//! 3. Validate (fatal on error, before any port is bound)
//! 4. Install the default DROP for the protected port
//! 5. Bind the decoy ports and run until ctrl-c

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use knockd::{KnockdConfig, KnockdRuntime};

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!(
                    "usage: knockd [--config <path>]\n\n\
                     Environment overrides: KNOCKD_SEQUENCE, KNOCKD_PROTECTED_PORT,\n\
                     KNOCKD_WINDOW_SECS, KNOCKD_OPEN_SECS, KNOCKD_BIND,\n\
                     KNOCKD_TRANSPORT, KNOCKD_FIREWALL, KNOCKD_SHUTDOWN_POLICY"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(config_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = parse_args()?;
    let config = KnockdConfig::load(config_path.as_deref()).context("loading configuration")?;

    let runtime = KnockdRuntime::new(config)?;
    runtime.run().await
}
