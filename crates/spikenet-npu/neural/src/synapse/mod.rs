// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synapse-level parameters: weight triples, learning rules, communication

pub mod com;
pub mod learn;
pub mod swt;

pub use com::{ComParams, ConnectionKind, PrjnScale, GBUF_INT_FACTOR};
pub use learn::{
    LRateParams, LearnNeurParams, LearnSynParams, RLRateParams, TraceParams, TrgAvgActParams,
};
pub use swt::{
    sig_fun, sig_fun61, sig_inv_fun, sig_inv_fun61, Limit, SWtAdaptParams, SWtInitParams,
    SWtParams,
};
