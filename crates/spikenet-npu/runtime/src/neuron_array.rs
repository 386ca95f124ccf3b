// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network-wide neuron storage
//!
//! One contiguous `Vec<f32>` of `NeuronVar` rows, one row per (neuron, lane),
//! plus lane-shared `NeuronAvgVar` rows and per-(neuron, lane) flag bytes.

use spikenet_npu_neural::{NeuronAvgVar, NeuronVar, VarRow};

/// Per-(neuron, lane) flag bits
pub mod flags {
    /// Neuron is excluded from computation
    pub const OFF: u8 = 1;
    /// External input is being applied (Ext drives GeExt)
    pub const HAS_EXT: u8 = 2;
    /// A target value is set for the plus phase
    pub const HAS_TARG: u8 = 4;
}

#[derive(Debug, Clone)]
pub struct NeuronArray {
    pub n_neurons: usize,
    pub n_data: usize,

    /// `[neuron][lane][NeuronVar]`
    pub vals: Vec<f32>,

    /// `[neuron][NeuronAvgVar]`
    pub avgs: Vec<f32>,

    /// `[neuron][lane]` flag bits
    pub flags: Vec<u8>,

    /// Owning layer of each neuron
    pub layer: Vec<u32>,

    /// Absolute index of the innermost pool containing each neuron
    pub sub_pool: Vec<u32>,
}

impl NeuronArray {
    pub fn new(n_data: usize) -> Self {
        Self {
            n_neurons: 0,
            n_data: n_data.max(1),
            vals: Vec::new(),
            avgs: Vec::new(),
            flags: Vec::new(),
            layer: Vec::new(),
            sub_pool: Vec::new(),
        }
    }

    /// Appends `n` zeroed neurons owned by `layer`; returns the first index
    pub fn extend(&mut self, n: usize, layer: u32) -> usize {
        let st = self.n_neurons;
        self.n_neurons += n;
        self.vals.resize(self.n_neurons * self.n_data * NeuronVar::COUNT, 0.0);
        self.avgs.resize(self.n_neurons * NeuronAvgVar::COUNT, 0.0);
        self.flags.resize(self.n_neurons * self.n_data, 0);
        self.layer.resize(self.n_neurons, layer);
        self.sub_pool.resize(self.n_neurons, 0);
        st
    }

    /// Row index of (neuron, lane)
    #[inline(always)]
    pub fn idx(&self, ni: usize, di: usize) -> usize {
        ni * self.n_data + di
    }

    #[inline]
    pub fn row(&self, ni: usize, di: usize) -> &[f32] {
        let st = self.idx(ni, di) * NeuronVar::COUNT;
        &self.vals[st..st + NeuronVar::COUNT]
    }

    #[inline]
    pub fn row_mut(&mut self, ni: usize, di: usize) -> &mut [f32] {
        let st = self.idx(ni, di) * NeuronVar::COUNT;
        &mut self.vals[st..st + NeuronVar::COUNT]
    }

    #[inline]
    pub fn get(&self, ni: usize, di: usize, var: NeuronVar) -> f32 {
        self.row(ni, di).var(var)
    }

    #[inline]
    pub fn set(&mut self, ni: usize, di: usize, var: NeuronVar, value: f32) {
        self.row_mut(ni, di).set_var(var, value);
    }

    #[inline]
    pub fn avg_row(&self, ni: usize) -> &[f32] {
        let st = ni * NeuronAvgVar::COUNT;
        &self.avgs[st..st + NeuronAvgVar::COUNT]
    }

    #[inline]
    pub fn avg_row_mut(&mut self, ni: usize) -> &mut [f32] {
        let st = ni * NeuronAvgVar::COUNT;
        &mut self.avgs[st..st + NeuronAvgVar::COUNT]
    }

    #[inline]
    pub fn get_avg(&self, ni: usize, var: NeuronAvgVar) -> f32 {
        self.avg_row(ni).var(var)
    }

    #[inline]
    pub fn set_avg(&mut self, ni: usize, var: NeuronAvgVar, value: f32) {
        self.avg_row_mut(ni).set_var(var, value);
    }

    /// Value by raw variable index, NaN when any index is out of range
    pub fn get_by_index(&self, ni: usize, di: usize, var_index: usize) -> f32 {
        if ni >= self.n_neurons || di >= self.n_data || var_index >= NeuronVar::COUNT {
            return f32::NAN;
        }
        self.vals[self.idx(ni, di) * NeuronVar::COUNT + var_index]
    }

    #[inline]
    pub fn has_flag(&self, ni: usize, di: usize, flag: u8) -> bool {
        self.flags[self.idx(ni, di)] & flag != 0
    }

    #[inline]
    pub fn set_flag(&mut self, ni: usize, di: usize, flag: u8) {
        let i = self.idx(ni, di);
        self.flags[i] |= flag;
    }

    #[inline]
    pub fn clear_flag(&mut self, ni: usize, di: usize, flag: u8) {
        let i = self.idx(ni, di);
        self.flags[i] &= !flag;
    }
}
