//! Configuration types for grpc-ctxlog.
//!
//! Config is loaded once at startup from a TOML file and validated before any
//! interceptor is built. Every section is optional; missing values fall back
//! to the defaults documented on each field.
//!
//! # Example
//! ```toml
//! [logging]
//! filter = "info,grpc_ctxlog=debug"
//! format = "json"
//!
//! [client]
//! panic_policy = "log_and_propagate"
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let filter = self.logging.filter.trim();
        anyhow::ensure!(!filter.is_empty(), "logging.filter must not be empty");
        EnvFilter::try_new(filter)
            .with_context(|| format!("logging.filter `{filter}` is not a valid filter directive"))?;
        Ok(())
    }
}

/// Subscriber settings used by [`crate::telemetry::init_tracing`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive (default: `info`). `RUST_LOG` takes precedence.
    #[serde(default = "defaults::filter")]
    pub filter: String,

    /// Output format (default: pretty).
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: defaults::filter(),
            format: LogFormat::default(),
        }
    }
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Client-side call logger settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub panic_policy: PanicPolicy,
}

/// What the call logger does when the invoked call panics.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PanicPolicy {
    /// Let the panic unwind untouched. No record is written for that call.
    #[default]
    Propagate,

    /// Catch the panic, write the call record at error severity with a
    /// `panic` field, then resume unwinding with the original payload.
    LogAndPropagate,
}

impl std::fmt::Display for PanicPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Propagate => "propagate",
            Self::LogAndPropagate => "log_and_propagate",
        })
    }
}

mod defaults {
    pub fn filter() -> String { "info".into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Parsing & validation
    // -----------------------------------------------------------------------

    #[test]
    fn parse_example_config() {
        let content = include_str!("../config.example.toml");
        let config: Config = toml::from_str(content).expect("example config should parse");
        config.validate().expect("example config should be valid");
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        config.validate().expect("defaults should be valid");

        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.client.panic_policy, PanicPolicy::Propagate);
    }

    #[test]
    fn validation_rejects_empty_filter() {
        let mut config = Config::default();
        config.logging.filter = "   ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_malformed_filter() {
        let mut config = Config::default();
        config.logging.filter = "grpc_ctxlog=notalevel".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/grpc-ctxlog.toml")).unwrap_err();
        assert!(err.to_string().contains("reading"), "unexpected error: {err}");
    }

    // -----------------------------------------------------------------------
    // Enum deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn panic_policy_deserializes_from_snake_case() {
        let config: Config = toml::from_str(
            r#"
            [client]
            panic_policy = "log_and_propagate"
            "#,
        )
        .unwrap();
        assert_eq!(config.client.panic_policy, PanicPolicy::LogAndPropagate);
    }

    #[test]
    fn unknown_panic_policy_is_rejected() {
        let parsed: Result<Config, _> = toml::from_str(
            r#"
            [client]
            panic_policy = "swallow"
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn log_format_deserializes_json() {
        let config: Config = toml::from_str("[logging]\nformat = \"json\"").unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "info");
    }
}
