// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `spikenet.toml`. Every field has a
//! default, so a partial file (or an empty one) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpikenetConfig {
    pub engine: EngineConfig,
    pub context: ContextConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

/// Compute backend selection and cycle monitoring
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `cpu`, `kernel` or `auto`
    pub backend: String,
    /// Worker threads / compute units (0 = all available cores)
    pub workers: usize,
    /// Rows per workgroup on the kernel backend
    pub workgroup_size: usize,
    /// Cycles slower than this are logged at warn level
    pub slow_cycle_warn_ms: u64,
    /// Auto selection prefers the kernel backend at or above this many synapses
    pub kernel_synapse_threshold: usize,
    /// Auto selection prefers the kernel backend at or above this many neurons
    pub kernel_neuron_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            workers: 0,
            workgroup_size: 256,
            slow_cycle_warn_ms: 50,
            kernel_synapse_threshold: 10_000_000,
            kernel_neuron_threshold: 100_000,
        }
    }
}

/// Trial timing and data-parallel lanes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Cycles per trial
    pub theta_cycles: u32,
    /// Cycles at the end of the trial that form the plus phase
    pub plus_cycles: u32,
    /// Independent input patterns processed in parallel
    pub n_data: usize,
    /// Trials between SlowAdapt passes
    pub slow_interval: u32,
    /// `event` or `continuous`
    pub syn_ca_mode: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            theta_cycles: 200,
            plus_cycles: 50,
            n_data: 1,
            slow_interval: 100,
            syn_ca_mode: "event".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    pub epochs: usize,
    pub trials_per_epoch: usize,
    /// Weight snapshot written after the last epoch
    pub weights_out: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            epochs: 100,
            trials_per_epoch: 25,
            weights_out: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
