// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Compute Backends
//!
//! Concrete implementations of [`ComputeBackend`]. Every cycle phase is
//! written once as a row kernel; a backend only decides how rows are spread
//! over workers, so switching backends never changes a computed value.
//!
//! - [`CPUBackend`]: dedicated rayon thread pool
//! - [`KernelBackend`]: compute-kernel style dispatch over fixed-size workgroups, run on host threads
//! - [`SerialBackend`]: single-threaded reference (re-exported from the runtime)

mod cpu;
mod kernel;

pub use cpu::CPUBackend;
pub use kernel::KernelBackend;
pub use spikenet_npu_runtime::{ComputeBackend, SerialBackend};

use spikenet_npu_neural::{NetError, Result};
use tracing::info;

/// Backend type enum for construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Work-stealing thread pool
    CPU,

    /// Workgroup dispatch over a fixed set of compute units
    Kernel,

    /// Pick from network size
    #[default]
    Auto,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::CPU => write!(f, "CPU"),
            BackendType::Kernel => write!(f, "Kernel"),
            BackendType::Auto => write!(f, "Auto"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(BackendType::CPU),
            "kernel" => Ok(BackendType::Kernel),
            "auto" => Ok(BackendType::Auto),
            _ => Err(NetError::InvalidBackend(s.to_string())),
        }
    }
}

/// Configuration for backend construction and auto-selection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Worker threads / compute units (0 = all available cores)
    pub workers: usize,

    /// Rows per workgroup on the kernel backend
    pub workgroup_size: usize,

    /// Minimum synapses before auto-selection prefers the kernel backend
    pub kernel_synapse_threshold: usize,

    /// Minimum neurons before auto-selection prefers the kernel backend
    pub kernel_neuron_threshold: usize,

    /// Force CPU even if the kernel backend would be selected
    pub force_cpu: bool,

    /// Force the kernel backend (for testing)
    pub force_kernel: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            workgroup_size: 256,
            // fixed per-dispatch spawn cost only pays off on large synapse arenas
            kernel_synapse_threshold: 10_000_000,
            kernel_neuron_threshold: 100_000,
            force_cpu: false,
            force_kernel: false,
        }
    }
}

/// Backend selection decision with rationale
#[derive(Debug, Clone)]
pub struct BackendDecision {
    pub backend_type: BackendType,
    pub reason: String,
}

/// Auto-select a backend from network size
///
/// Selection priority:
/// 1. Honor force flags (`force_cpu` wins over `force_kernel`)
/// 2. Kernel backend when either size threshold is met
/// 3. CPU otherwise
pub fn select_backend(
    neuron_count: usize,
    synapse_count: usize,
    config: &BackendConfig,
) -> BackendDecision {
    if config.force_cpu {
        return BackendDecision {
            backend_type: BackendType::CPU,
            reason: "Forced CPU via configuration".to_string(),
        };
    }
    if config.force_kernel {
        return BackendDecision {
            backend_type: BackendType::Kernel,
            reason: "Forced Kernel via configuration".to_string(),
        };
    }

    if neuron_count >= config.kernel_neuron_threshold
        || synapse_count >= config.kernel_synapse_threshold
    {
        return BackendDecision {
            backend_type: BackendType::Kernel,
            reason: format!(
                "Kernel selected: {} neurons, {} synapses (at or above kernel thresholds)",
                neuron_count, synapse_count
            ),
        };
    }

    BackendDecision {
        backend_type: BackendType::CPU,
        reason: format!(
            "CPU selected: {} neurons, {} synapses (below kernel thresholds)",
            neuron_count, synapse_count
        ),
    }
}

/// Builds a backend, resolving `Auto` from the network size
pub fn create_backend(
    backend_type: BackendType,
    neuron_count: usize,
    synapse_count: usize,
    config: &BackendConfig,
) -> Result<Box<dyn ComputeBackend>> {
    let actual_type = if backend_type == BackendType::Auto {
        let decision = select_backend(neuron_count, synapse_count, config);
        info!(
            backend = %decision.backend_type,
            reason = %decision.reason,
            "backend auto-selection"
        );
        decision.backend_type
    } else {
        backend_type
    };

    match actual_type {
        BackendType::CPU => {
            let backend = CPUBackend::new(config.workers)?;
            info!(workers = backend.workers(), "using CPU backend");
            Ok(Box::new(backend))
        }
        BackendType::Kernel => {
            let backend = KernelBackend::new(config.workers, config.workgroup_size)?;
            info!(
                compute_units = backend.workers(),
                workgroup_size = backend.workgroup_size(),
                "using kernel backend"
            );
            Ok(Box::new(backend))
        }
        BackendType::Auto => Err(NetError::InvalidBackend(
            "auto must resolve to a concrete backend".to_string(),
        )),
    }
}
