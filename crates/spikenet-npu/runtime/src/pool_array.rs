// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pool storage: reduction and inhibition state per (pool, lane)

use spikenet_npu_neural::{PoolVar, VarRow};

#[derive(Debug, Clone)]
pub struct PoolArray {
    pub n_pools: usize,
    pub n_data: usize,

    /// `[pool][lane][PoolVar]`
    pub vals: Vec<f32>,

    /// First neuron (absolute)
    pub st: Vec<u32>,

    /// One past the last neuron (absolute)
    pub ed: Vec<u32>,

    /// Owning layer
    pub layer: Vec<u32>,

    /// True for the whole-layer pool, false for sub-pools
    pub is_layer: Vec<bool>,
}

impl PoolArray {
    pub fn new(n_data: usize) -> Self {
        Self {
            n_pools: 0,
            n_data: n_data.max(1),
            vals: Vec::new(),
            st: Vec::new(),
            ed: Vec::new(),
            layer: Vec::new(),
            is_layer: Vec::new(),
        }
    }

    /// Appends a pool over neurons `st..ed`; returns its index
    pub fn push(&mut self, st: u32, ed: u32, layer: u32, is_layer: bool) -> usize {
        let pi = self.n_pools;
        self.n_pools += 1;
        self.vals.resize(self.n_pools * self.n_data * PoolVar::COUNT, 0.0);
        self.st.push(st);
        self.ed.push(ed);
        self.layer.push(layer);
        self.is_layer.push(is_layer);
        pi
    }

    #[inline(always)]
    pub fn idx(&self, pi: usize, di: usize) -> usize {
        pi * self.n_data + di
    }

    #[inline]
    pub fn row(&self, pi: usize, di: usize) -> &[f32] {
        let st = self.idx(pi, di) * PoolVar::COUNT;
        &self.vals[st..st + PoolVar::COUNT]
    }

    #[inline]
    pub fn row_mut(&mut self, pi: usize, di: usize) -> &mut [f32] {
        let st = self.idx(pi, di) * PoolVar::COUNT;
        &mut self.vals[st..st + PoolVar::COUNT]
    }

    #[inline]
    pub fn get(&self, pi: usize, di: usize, var: PoolVar) -> f32 {
        self.row(pi, di).var(var)
    }

    #[inline]
    pub fn set(&mut self, pi: usize, di: usize, var: PoolVar, value: f32) {
        self.row_mut(pi, di).set_var(var, value);
    }

    /// Number of neurons in a pool
    #[inline]
    pub fn n(&self, pi: usize) -> usize {
        (self.ed[pi] - self.st[pi]) as usize
    }

    /// `sum / n`, 0 for an empty pool
    #[inline]
    pub fn avg(sum: f32, n: usize) -> f32 {
        if n == 0 {
            0.0
        } else {
            sum / n as f32
        }
    }

    /// Value by raw variable index, NaN when out of range
    pub fn get_by_index(&self, pi: usize, di: usize, var_index: usize) -> f32 {
        if pi >= self.n_pools || di >= self.n_data || var_index >= PoolVar::COUNT {
            return f32::NAN;
        }
        self.vals[self.idx(pi, di) * PoolVar::COUNT + var_index]
    }
}
