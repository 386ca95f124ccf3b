// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core types shared by every spikenet crate

pub mod context;
pub mod error;
pub mod vars;

pub use context::{Context, ThetaPhase};
pub use error::{Error, NetError, Result};
pub use vars::{NeuronAvgVar, NeuronVar, PoolVar, SynCaVar, SynapseVar, VarRow};
