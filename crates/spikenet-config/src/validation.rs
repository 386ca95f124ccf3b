// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every violation is collected so one run reports all of them.

use crate::{ConfigError, ConfigResult, SpikenetConfig};

const BACKENDS: [&str; 3] = ["cpu", "kernel", "auto"];
const SYN_CA_MODES: [&str; 2] = ["event", "continuous"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    UnknownChoice { field: String, value: String, allowed: &'static [&'static str] },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::UnknownChoice {
                field,
                value,
                allowed,
            } => {
                write!(
                    f,
                    "Unknown value '{}' for {} (expected one of: {})",
                    value,
                    field,
                    allowed.join(", ")
                )
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &SpikenetConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_engine(config, &mut errors);
    validate_context(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn check_choice(
    field: &str,
    value: &str,
    allowed: &'static [&'static str],
    errors: &mut Vec<ConfigValidationError>,
) {
    if !allowed.contains(&value.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::UnknownChoice {
            field: field.to_string(),
            value: value.to_string(),
            allowed,
        });
    }
}

fn validate_engine(config: &SpikenetConfig, errors: &mut Vec<ConfigValidationError>) {
    check_choice("engine.backend", &config.engine.backend, &BACKENDS, errors);
    if config.engine.workgroup_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "engine.workgroup_size".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
}

fn validate_context(config: &SpikenetConfig, errors: &mut Vec<ConfigValidationError>) {
    let ctx = &config.context;
    if ctx.theta_cycles == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "context.theta_cycles".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    if ctx.plus_cycles == 0 || ctx.plus_cycles >= ctx.theta_cycles {
        errors.push(ConfigValidationError::InvalidValue {
            field: "context.plus_cycles".to_string(),
            reason: format!(
                "must be in 1..{} (theta_cycles), got {}",
                ctx.theta_cycles, ctx.plus_cycles
            ),
        });
    }
    if ctx.n_data == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "context.n_data".to_string(),
            reason: "at least one data lane is required".to_string(),
        });
    }
    if ctx.slow_interval == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "context.slow_interval".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    check_choice("context.syn_ca_mode", &ctx.syn_ca_mode, &SYN_CA_MODES, errors);
}

fn validate_logging(config: &SpikenetConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.logging.level.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "logging.level".to_string(),
        });
    } else {
        check_choice("logging.level", &config.logging.level, &LOG_LEVELS, errors);
    }
}
