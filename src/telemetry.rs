//! Global `tracing` subscriber setup.
//!
//! Call once at application start, before any interceptor logs. `RUST_LOG`
//! wins over the configured filter so operators can raise verbosity without
//! touching the config file.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Install the process-wide subscriber described by `cfg`.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.filter)
            .with_context(|| format!("invalid log filter `{}`", cfg.filter))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match cfg.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed
        .map_err(|e| anyhow::anyhow!(e))
        .context("installing tracing subscriber")?;

    tracing::debug!(format = ?cfg.format, filter = %cfg.filter, "tracing initialised");
    Ok(())
}
