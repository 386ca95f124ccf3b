// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikenet Plasticity
//!
//! End-of-trial and slow learning passes over the runtime arenas:
//! - **DWt**: calcium-driven weight change and its per-receiver zero-sum
//! - **Weights**: WtFmDWt, SWt adaptation and synaptic scaling
//! - **Homeostasis**: target-activity bookkeeping and adaptive inhibition
//! - **Failure**: deterministic stochastic transmission failure
//! - **LRate**: network-wide learning-rate multipliers
//!
//! Every pass is a sequence of row-disjoint dispatches through a
//! [`ComputeBackend`](spikenet_npu_runtime::ComputeBackend). Reductions over a
//! receiver's synapses run inside one kernel invocation, so results do not
//! depend on the backend or its worker count.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod dwt;
pub mod homeostasis;
pub mod lrate;
pub mod syn_fail;
pub mod weights;

pub use dwt::{dwt, dwt_sub_mean};
pub use homeostasis::{adapt_inhib, avg_dif_from_trg_avg, init_trg_avg, trg_avg_from_d};
pub use lrate::{set_lrate_mod, set_lrate_sched, set_sub_mean};
pub use syn_fail::{syn_fail, syn_seed};
pub use weights::{slow_adapt, swt_from_wt, syn_scale, wt_from_dwt};

use spikenet_npu_neural::SynapseVar;
use spikenet_npu_runtime::Connection;

/// Synapse value rows owned by one connection
#[inline]
pub(crate) fn conn_rows<'a>(syns: &'a mut [f32], conn: &Connection) -> &'a mut [f32] {
    let c = SynapseVar::COUNT;
    &mut syns[conn.syn_st * c..(conn.syn_st + conn.n_syns) * c]
}

