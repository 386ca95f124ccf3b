// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Layer descriptor
//!
//! A layer owns index ranges into the neuron and pool arenas, its
//! parameters, and a small block of per-lane scalar state.

use serde::{Deserialize, Serialize};
use spikenet_npu_neural::{ActParams, InhibParams, LearnNeurParams};

use crate::shape::LayerShape;

/// Between-layer inhibition sources per layer
pub const MAX_LAY_INHIB: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Hidden,
    /// Clamped to external input in both phases
    Input,
    /// Clamped to its target pattern in the plus phase only
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LayerParams {
    pub act: ActParams,
    pub inhib: InhibParams,
    pub learn: LearnNeurParams,
}

impl LayerParams {
    /// Defaults for a layer of the given kind. Input layers clamp harder
    /// under lighter inhibition, and neither clamped kind zero-sums TrgAvg.
    pub fn for_kind(kind: LayerKind) -> Self {
        let mut p = Self::default();
        match kind {
            LayerKind::Input => {
                p.act.clamp.ge = 1.5;
                p.inhib.layer.gi = 0.9;
                p.inhib.pool.gi = 0.9;
                p.learn.trg_avg_act.sub_mean = 0.0;
            }
            LayerKind::Target => {
                p.act.clamp.ge = 0.8;
                p.learn.trg_avg_act.sub_mean = 0.0;
            }
            LayerKind::Hidden => {}
        }
        p
    }

    pub fn update(&mut self) {
        self.act.update();
        self.inhib.update();
        self.learn.update();
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.act.validate()?;
        self.inhib.validate()?;
        self.learn.validate()
    }
}

/// Running centered-cosine similarity between minus and plus phase activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CorSimStats {
    /// Most recent trial
    pub cor: f32,
    pub avg: f32,
    pub var: f32,
}

/// Per-lane layer state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerVals {
    /// Running average of minus-phase pool activity
    pub act_m_avg: f32,
    /// Running average of plus-phase pool activity
    pub act_p_avg: f32,
    /// Adaptive inhibition multiplier
    pub gi_mult: f32,
    pub cor_sim: CorSimStats,
}

impl LayerVals {
    pub fn new(nominal: f32) -> Self {
        Self {
            act_m_avg: nominal,
            act_p_avg: nominal,
            gi_mult: 1.0,
            cor_sim: CorSimStats::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub index: usize,
    pub kind: LayerKind,
    pub shape: LayerShape,

    /// First neuron in the network arena
    pub neur_st: usize,
    pub n_neurons: usize,

    /// Whole-layer pool; sub-pools follow contiguously
    pub pool_st: usize,
    /// Pool count including the whole-layer pool
    pub n_pools: usize,

    pub params: LayerParams,

    /// One entry per data lane
    pub vals: Vec<LayerVals>,

    /// Layers whose pool Gi this layer takes the max with
    pub lay_inhib: Vec<usize>,

    /// Connections this layer receives (indices into the network list)
    pub recv_conns: Vec<usize>,
    pub send_conns: Vec<usize>,
}

impl Layer {
    /// Neuron range in the network arena
    #[inline]
    pub fn neurons(&self) -> std::ops::Range<usize> {
        self.neur_st..self.neur_st + self.n_neurons
    }

    /// Pool range in the network arena, whole-layer pool first
    #[inline]
    pub fn pools(&self) -> std::ops::Range<usize> {
        self.pool_st..self.pool_st + self.n_pools
    }

    #[inline]
    pub fn has_sub_pools(&self) -> bool {
        self.n_pools > 1
    }

    pub fn is_input(&self) -> bool {
        self.kind == LayerKind::Input
    }

    pub fn is_target(&self) -> bool {
        self.kind == LayerKind::Target
    }

    /// True when this layer's neurons take Ext as input in the given phase
    pub fn is_clamped(&self, plus_phase: bool) -> bool {
        match self.kind {
            LayerKind::Input => true,
            LayerKind::Target => plus_phase,
            LayerKind::Hidden => false,
        }
    }

    /// Hidden layers with target-activity homeostasis enabled
    pub fn learns_trg_avg(&self) -> bool {
        self.kind == LayerKind::Hidden && self.params.learn.trg_avg_act.on
    }

    /// Nominal expected activity, used for conductance scaling
    pub fn nominal_act(&self) -> f32 {
        self.params.inhib.act_avg.nominal
    }
}
