// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikenet
//!
//! Deterministic, data-parallel spiking neural network engine with
//! error-driven learning. Networks are rate-coded AdEx neurons under
//! feedforward/feedback inhibition, trained with a two-phase (minus/plus)
//! calcium rule.
//!
//! This umbrella crate re-exports the workspace crates:
//!
//! | Module | Crate |
//! |---|---|
//! | [`neural`] | variable registry, parameters, per-element arithmetic |
//! | [`runtime`] | arenas, layer/connection descriptors, backend trait |
//! | [`plasticity`] | learning passes |
//! | [`burst_engine`] | backends, cycle scheduler, builder, trial loop |
//! | [`config`] | `spikenet.toml` loading |
//! | [`observability`] | logging setup |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use spikenet::prelude::*;
//!
//! let mut net = NetworkBuilder::new("xor")
//!     .seed(7)
//!     .layer("In", &[2], LayerKind::Input)
//!     .layer("Hid", &[4], LayerKind::Hidden)
//!     .layer("Out", &[1], LayerKind::Target)
//!     .connect("In", "Hid", Pattern::default())
//!     .connect("Hid", "Out", Pattern::default())
//!     .connect("Out", "Hid", Pattern::default())
//!     .build()?;
//!
//! net.apply_ext("In", 0, &ExtPattern::flat(vec![1.0, 0.0]))?;
//! net.apply_ext("Out", 0, &ExtPattern::flat(vec![1.0]))?;
//! let stats = run_trial(&mut net, true)?;
//! println!("CorSim {:.3}", stats.mean_cor_sim());
//! # Ok::<(), spikenet::neural::NetError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use spikenet_config as config;
pub use spikenet_npu_burst_engine as burst_engine;
pub use spikenet_npu_neural as neural;
pub use spikenet_npu_plasticity as plasticity;
pub use spikenet_npu_runtime as runtime;
pub use spikenet_observability as observability;

pub mod train;

/// Common imports for building and running networks
pub mod prelude {
    pub use spikenet_npu_burst_engine::{
        run_trial, BackendConfig, BackendType, CPUBackend, ComputeBackend, EngineStats,
        ExtPattern, KernelBackend, Network, NetworkBuilder, NetworkWeights, SerialBackend,
        TrialStats,
    };
    pub use spikenet_npu_neural::{
        Context, NetError, NeuronAvgVar, NeuronVar, PoolVar, Result, SynCaMode, SynCaVar,
        SynapseVar,
    };
    pub use spikenet_npu_runtime::{ConnParams, LayerKind, LayerParams, Pattern};

    pub use crate::train::{EpochStats, PatternSet, Trainer};
}
