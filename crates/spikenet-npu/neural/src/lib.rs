// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikenet Neural Computation
//!
//! Everything a single neuron, pool or synapse needs, with no knowledge of
//! arrays, threads or networks:
//! - **Types**: variable registry, simulation [`Context`], error type
//! - **Models**: membrane/spike dynamics, FFFB inhibition, calcium cascades
//! - **Synapse**: weight triples, learning rules, spike communication
//!
//! Functions here operate on one variable row at a time (`&mut [f32]`
//! indexed by a registry enum), which lets the runtime dispatch them over
//! disjoint rows on any backend.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod models;
pub mod synapse;
pub mod types;

pub use models::*;
pub use synapse::*;
pub use types::{
    Context, Error, NetError, NeuronAvgVar, NeuronVar, PoolVar, Result, SynCaVar, SynapseVar,
    ThetaPhase, VarRow,
};
