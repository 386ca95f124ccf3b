// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikenet Burst Engine
//!
//! Cycle-level execution of a spiking network.
//!
//! ## Cycle
//! Every cycle is five barriered phases, each a data-parallel dispatch
//! through the active [`ComputeBackend`]:
//! 1. conductance gather/scatter through per-connection delay buffers
//! 2. pool reduction
//! 3. inhibition (layer, between-layer max, sub-pool)
//! 4. membrane and spike update
//! 5. neuron and synapse calcium
//!
//! ## Determinism
//! Identical inputs and seed give bit-identical neuron and synapse state on
//! every backend and worker count. Kernels write disjoint rows, reductions
//! run in a fixed order, and the only cross-row writes are integer atomic
//! adds into the conductance buffers.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod builder;
pub mod input;
pub mod network;
pub mod phases;
pub mod scheduler;
pub mod stats;
pub mod trial;
pub mod weights;

pub use backend::*;
pub use builder::NetworkBuilder;
pub use input::ExtPattern;
pub use network::Network;
pub use scheduler::{CycleProfile, CycleScheduler};
pub use trial::{run_trial, TrialStats};
pub use weights::{ConnectionWeights, LayerWeights, NetworkWeights, SynapseWeights};

/// Running totals over many trials
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub total_trials: u64,
    pub total_cycles: u64,
    pub total_spikes: u64,
    pub total_processing_time_us: u64,
}

impl EngineStats {
    pub fn record(&mut self, trial: &TrialStats, cycles: u64) {
        self.total_trials += 1;
        self.total_cycles += cycles;
        self.total_spikes += trial.spikes;
        self.total_processing_time_us += trial.elapsed.as_micros() as u64;
    }

    /// Get average processing time per trial (microseconds)
    pub fn avg_trial_time_us(&self) -> f64 {
        if self.total_trials == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / self.total_trials as f64
        }
    }

    /// Get average processing time per cycle (microseconds)
    pub fn avg_cycle_time_us(&self) -> f64 {
        if self.total_cycles == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / self.total_cycles as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_engine_stats() {
        let mut stats = EngineStats::default();
        assert_eq!(stats.avg_trial_time_us(), 0.0);
        let t = TrialStats {
            trial: 1,
            cor_sim: Vec::new(),
            spikes: 7,
            slow: false,
            elapsed: Duration::from_micros(2000),
        };
        stats.record(&t, 200);
        stats.record(&t, 200);
        assert_eq!(stats.total_spikes, 14);
        assert_eq!(stats.avg_trial_time_us(), 2000.0);
        assert_eq!(stats.avg_cycle_time_us(), 10.0);
    }
}
