// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikenet Runtime Storage
//!
//! Flat, network-wide arenas and the descriptors that slice them:
//! - **Arenas**: [`NeuronArray`], [`SynapseArray`], [`PoolArray`]
//! - **Conductance buffers**: [`GBuf`], one atomic ring buffer per connection
//! - **Descriptors**: [`Layer`] and [`Connection`] own index ranges, never elements
//! - **Dispatch**: the [`ComputeBackend`] trait every phase runs through
//!
//! ## Layout
//!
//! | Arena | Row | Row index |
//! |-------|-----|-----------|
//! | neuron vals | `NeuronVar::COUNT` | `ni * n_data + di` |
//! | neuron avgs | `NeuronAvgVar::COUNT` | `ni` |
//! | synapse vals | `SynapseVar::COUNT` | `si` |
//! | synapse Ca | `SynCaVar::COUNT` | `si * n_data + di` |
//! | pool vals | `PoolVar::COUNT` | `pi * n_data + di` |
//!
//! Synapses are stored grouped by connection and, within a connection,
//! ordered by sending neuron.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod connection;
pub mod gbuf;
pub mod layer;
pub mod neuron_array;
pub mod pattern;
pub mod pool_array;
pub mod shape;
pub mod synapse_array;

pub use backend::{ComputeBackend, IndexKernel, RowKernel, SerialBackend};
pub use connection::{ConnParams, Connection, StartN};
pub use gbuf::GBuf;
pub use layer::{CorSimStats, Layer, LayerKind, LayerParams, LayerVals, MAX_LAY_INHIB};
pub use neuron_array::{flags, NeuronArray};
pub use pattern::Pattern;
pub use pool_array::PoolArray;
pub use shape::LayerShape;
pub use synapse_array::SynapseArray;
