use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter directives, e.g. `SANDCASTLE_LOG=sandcastle=debug`.
pub const LOG_ENV: &str = "SANDCASTLE_LOG";

static INIT: OnceLock<()> = OnceLock::new();

/// Log to stderr so command output on stdout stays clean.
pub fn init(verbose: bool) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    let _ = INIT.set(());
    Ok(())
}
