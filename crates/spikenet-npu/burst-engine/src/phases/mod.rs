// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Cycle Phases
//!
//! One cycle is five barriered phases, each a set of row kernels dispatched
//! through a [`ComputeBackend`](spikenet_npu_runtime::ComputeBackend):
//!
//! 1. [`gather`]: scatter last cycle's spikes into delayed conductance
//!    buffers, then drain this cycle's slot into GeRaw / GiRaw
//! 2. [`pools`]: reduce neurons into pool FF / FB aggregates
//! 3. [`inhibition`]: layer FFFB, between-layer max, sub-pool FFFB
//! 4. [`membrane`]: conductances, Vm, spikes, rate code
//! 5. [`calcium`]: neuron Ca cascades, then synapse Ca
//!
//! A kernel only writes its own row. Scatter is the one place where rows
//! are shared, and it writes through the atomic conductance buffer.

pub mod calcium;
pub mod gather;
pub mod inhibition;
pub mod membrane;
pub mod pools;

use spikenet_npu_runtime::{Connection, Layer};

/// Read-only topology shared by every phase
#[derive(Clone, Copy)]
pub struct Topology<'a> {
    pub layers: &'a [Layer],
    pub conns: &'a [Connection],
}
