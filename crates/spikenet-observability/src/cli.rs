// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-spikenet-npu-burst-engine` and `--debug-all`
//! to raise one crate (or every crate) to debug level.

use std::collections::HashMap;
use std::env;

use crate::{crate_target, KNOWN_CRATES};

/// Per-crate debug switches
///
/// # Example
/// ```rust
/// use spikenet_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-spikenet-config".to_string()]);
/// assert!(flags.is_enabled("spikenet-config"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`; `--debug-all`
    /// enables every known crate. Other arguments are ignored.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self::extract(args).0
    }

    /// Splits debug flags out of an argument list
    ///
    /// Returns the flags and the remaining arguments in their original order,
    /// so the remainder can be handed to a stricter argument parser.
    pub fn extract<I>(args: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        let mut rest = Vec::new();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            } else {
                rest.push(arg);
            }
        }

        (flags, rest)
    }

    /// Adds crates named in a `SPIKENET_DEBUG` style value
    ///
    /// Format: comma-separated crate names, or `all`.
    pub fn merge_env_value(&mut self, value: &str) {
        if value.trim() == "all" {
            self.enable_all();
            return;
        }
        for crate_name in value.split(',') {
            let crate_name = crate_name.trim();
            if !crate_name.is_empty() {
                self.enable(crate_name);
            }
        }
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string(), true);
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    /// Check if debug is enabled for a specific crate
    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.get(crate_name).copied().unwrap_or(false)
    }

    /// Enabled crate names, sorted
    pub fn enabled_crates(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self
            .enabled_crates
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    /// Check if debug is enabled for any crate
    pub fn any_enabled(&self) -> bool {
        self.enabled_crates.values().any(|on| *on)
    }

    /// Log level for a crate: `DEBUG` if enabled, `INFO` otherwise
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// `EnvFilter` directives for these flags over a base level
    ///
    /// Format: `info,spikenet_npu_burst_engine=debug`. Crate names are
    /// converted to their module targets.
    pub fn to_filter_string(&self, base_level: &str) -> String {
        let mut filters = vec![base_level.to_lowercase()];
        for crate_name in self.enabled_crates() {
            filters.push(format!("{}=debug", crate_target(crate_name)));
        }
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `SPIKENET_DEBUG`
///
/// Returns the flags and the arguments that were not debug flags.
pub fn parse_debug_flags() -> (CrateDebugFlags, Vec<String>) {
    let (mut flags, rest) = CrateDebugFlags::extract(env::args());
    if let Ok(value) = env::var("SPIKENET_DEBUG") {
        flags.merge_env_value(&value);
    }
    (flags, rest)
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  SPIKENET_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  SPIKENET_DEBUG=all                               Enable debug for all crates

Examples:
  --debug-spikenet-npu-burst-engine
  SPIKENET_DEBUG=spikenet-npu-plasticity,spikenet-config
"#,
        KNOWN_CRATES.join(", ")
    )
}
