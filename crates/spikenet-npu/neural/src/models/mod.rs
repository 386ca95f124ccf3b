// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Neuron and pool models: membrane dynamics, FFFB inhibition, calcium cascades

pub mod calcium;
pub mod inhib;
pub mod membrane;

pub use calcium::{CaCascadeParams, CaLrnParams, CaSpkParams, KinaseCaParams, SynCaMode};
pub use inhib::{decay_inhib, zero_inhib, ActAvgParams, BgParams, GiParams, InhibParams};
pub use membrane::{
    vm_to_bio, ActParams, Chans, ClampParams, DecayParams, DtParams, KNaMedSlow, KNaParams,
    NmdaParams, SpikeParams, VmRange,
};
