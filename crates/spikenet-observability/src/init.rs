// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Console logging initialization
//!
//! One `fmt` layer on a `Registry`, filtered by an `EnvFilter` built from the
//! configured level and the per-crate debug flags.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use spikenet_config::{LogFormat, LoggingConfig};

/// Builds the filter for a logging config and debug flags
///
/// # Errors
/// Fails when `config.level` is not a `tracing` level name.
pub fn build_filter(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<EnvFilter> {
    config
        .level
        .parse::<tracing::Level>()
        .map_err(|_| anyhow!("Unknown log level '{}'", config.level))?;
    let directives = debug_flags.to_filter_string(&config.level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter: {}", directives))
}

/// Install the global subscriber
///
/// Text output omits targets; JSON output carries target, file and line for
/// every event.
///
/// # Errors
/// Fails on an unknown level, or when a global subscriber is already set.
/// Never panics on repeated calls.
pub fn init_logging(config: &LoggingConfig, debug_flags: &CrateDebugFlags) -> Result<()> {
    let filter = build_filter(config, debug_flags)?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed(),
    };

    Registry::default()
        .with(layer)
        .try_init()
        .context("Global logging subscriber already initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "loud".to_string(),
            format: LogFormat::Text,
        };
        assert!(build_filter(&config, &CrateDebugFlags::default()).is_err());
    }

    #[test]
    fn test_build_filter_with_flags() {
        let config = LoggingConfig::default();
        let flags = CrateDebugFlags::from_args(vec!["--debug-spikenet-npu-runtime".to_string()]);
        assert!(build_filter(&config, &flags).is_ok());
    }

    #[test]
    fn test_repeated_init_returns_error() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Json,
        };
        let flags = CrateDebugFlags::default();
        let _ = init_logging(&config, &flags);
        assert!(init_logging(&config, &flags).is_err());
    }
}
