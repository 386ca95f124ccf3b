// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SpikenetConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "spikenet.toml";

/// Find the spikenet configuration file
///
/// Search order:
/// 1. `SPIKENET_CONFIG_PATH` environment variable
/// 2. Current working directory: `./spikenet.toml`
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SPIKENET_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SPIKENET_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SPIKENET_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the file is not found, cannot be read, or is not valid TOML.
/// Values are not validated here; call [`crate::validate_config`] afterwards.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SpikenetConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SpikenetConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SPIKENET_BACKEND` -> `engine.backend`
/// - `SPIKENET_WORKERS` -> `engine.workers`
/// - `SPIKENET_N_DATA` -> `context.n_data`
/// - `SPIKENET_SEED` -> `run.seed`
/// - `SPIKENET_LOG_LEVEL` -> `logging.level`
/// - `SPIKENET_SYN_CA_MODE` -> `context.syn_ca_mode`
///
/// Numeric variables that do not parse are ignored.
pub fn apply_environment_overrides(config: &mut SpikenetConfig) {
    if let Ok(value) = env::var("SPIKENET_BACKEND") {
        config.engine.backend = value;
    }
    if let Ok(value) = env::var("SPIKENET_WORKERS") {
        if let Ok(workers) = value.parse::<usize>() {
            config.engine.workers = workers;
        }
    }
    if let Ok(value) = env::var("SPIKENET_N_DATA") {
        if let Ok(n_data) = value.parse::<usize>() {
            config.context.n_data = n_data;
        }
    }
    if let Ok(value) = env::var("SPIKENET_SEED") {
        if let Ok(seed) = value.parse::<u64>() {
            config.run.seed = seed;
        }
    }
    if let Ok(value) = env::var("SPIKENET_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("SPIKENET_SYN_CA_MODE") {
        config.context.syn_ca_mode = value;
    }
}

fn parse_cli<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

/// Apply CLI argument overrides to configuration
///
/// Keys are `section.field` or the bare field name (`backend`, `seed`,
/// `epochs`, ...). Unlike environment variables, an explicit CLI value that
/// does not parse is an error.
///
/// # Errors
///
/// `ConfigError::InvalidValue` for unparseable numbers
pub fn apply_cli_overrides(
    config: &mut SpikenetConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for (key, value) in cli_args {
        let field = key.rsplit('.').next().unwrap_or(key.as_str());
        match field {
            "backend" => config.engine.backend = value.clone(),
            "workers" => config.engine.workers = parse_cli(key, value)?,
            "workgroup_size" => config.engine.workgroup_size = parse_cli(key, value)?,
            "slow_cycle_warn_ms" => config.engine.slow_cycle_warn_ms = parse_cli(key, value)?,
            "theta_cycles" => config.context.theta_cycles = parse_cli(key, value)?,
            "plus_cycles" => config.context.plus_cycles = parse_cli(key, value)?,
            "n_data" => config.context.n_data = parse_cli(key, value)?,
            "slow_interval" => config.context.slow_interval = parse_cli(key, value)?,
            "syn_ca_mode" => config.context.syn_ca_mode = value.clone(),
            "seed" => config.run.seed = parse_cli(key, value)?,
            "epochs" => config.run.epochs = parse_cli(key, value)?,
            "trials_per_epoch" => config.run.trials_per_epoch = parse_cli(key, value)?,
            "weights_out" => config.run.weights_out = Some(PathBuf::from(value)),
            "log_level" | "level" => config.logging.level = value.clone(),
            _ => {}
        }
    }
    Ok(())
}
