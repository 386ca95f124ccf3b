// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network-wide synapse storage
//!
//! Weight rows are shared by every data lane; calcium rows are per lane.
//! Endpoints are absolute neuron indices.

use spikenet_npu_neural::{KinaseCaParams, SynCaVar, SynapseVar, VarRow};

#[derive(Debug, Clone)]
pub struct SynapseArray {
    pub n_syns: usize,
    pub n_data: usize,

    /// `[synapse][SynapseVar]`
    pub vals: Vec<f32>,

    /// `[synapse][lane][SynCaVar]`
    pub ca: Vec<f32>,

    /// Sending neuron
    pub send: Vec<u32>,

    /// Receiving neuron
    pub recv: Vec<u32>,

    /// Owning connection
    pub conn: Vec<u32>,
}

impl SynapseArray {
    pub fn new(n_data: usize) -> Self {
        Self {
            n_syns: 0,
            n_data: n_data.max(1),
            vals: Vec::new(),
            ca: Vec::new(),
            send: Vec::new(),
            recv: Vec::new(),
            conn: Vec::new(),
        }
    }

    pub fn with_capacity(n_data: usize, capacity: usize) -> Self {
        let mut arr = Self::new(n_data);
        arr.vals.reserve(capacity * SynapseVar::COUNT);
        arr.ca.reserve(capacity * arr.n_data * SynCaVar::COUNT);
        arr.send.reserve(capacity);
        arr.recv.reserve(capacity);
        arr.conn.reserve(capacity);
        arr
    }

    /// Appends a zero-weight synapse; returns its index
    pub fn push(&mut self, send: u32, recv: u32, conn: u32) -> usize {
        let si = self.n_syns;
        self.n_syns += 1;
        self.vals.extend(std::iter::repeat(0.0).take(SynapseVar::COUNT));
        for _ in 0..self.n_data {
            let st = self.ca.len();
            self.ca.extend(std::iter::repeat(0.0).take(SynCaVar::COUNT));
            KinaseCaParams::init_syn_ca(&mut self.ca[st..]);
        }
        self.send.push(send);
        self.recv.push(recv);
        self.conn.push(conn);
        si
    }

    #[inline]
    pub fn row(&self, si: usize) -> &[f32] {
        let st = si * SynapseVar::COUNT;
        &self.vals[st..st + SynapseVar::COUNT]
    }

    #[inline]
    pub fn row_mut(&mut self, si: usize) -> &mut [f32] {
        let st = si * SynapseVar::COUNT;
        &mut self.vals[st..st + SynapseVar::COUNT]
    }

    #[inline]
    pub fn get(&self, si: usize, var: SynapseVar) -> f32 {
        self.row(si).var(var)
    }

    #[inline]
    pub fn set(&mut self, si: usize, var: SynapseVar, value: f32) {
        self.row_mut(si).set_var(var, value);
    }

    #[inline]
    pub fn ca_row(&self, si: usize, di: usize) -> &[f32] {
        let st = (si * self.n_data + di) * SynCaVar::COUNT;
        &self.ca[st..st + SynCaVar::COUNT]
    }

    #[inline]
    pub fn ca_row_mut(&mut self, si: usize, di: usize) -> &mut [f32] {
        let st = (si * self.n_data + di) * SynCaVar::COUNT;
        &mut self.ca[st..st + SynCaVar::COUNT]
    }

    /// Value by raw variable index, NaN when out of range
    pub fn get_by_index(&self, si: usize, var_index: usize) -> f32 {
        if si >= self.n_syns || var_index >= SynapseVar::COUNT {
            return f32::NAN;
        }
        self.vals[si * SynapseVar::COUNT + var_index]
    }

    /// Calcium value by raw variable index, NaN when out of range
    pub fn get_ca_by_index(&self, si: usize, di: usize, var_index: usize) -> f32 {
        if si >= self.n_syns || di >= self.n_data || var_index >= SynCaVar::COUNT {
            return f32::NAN;
        }
        self.ca[(si * self.n_data + di) * SynCaVar::COUNT + var_index]
    }

    /// Resets every calcium row to the never-updated state
    pub fn init_ca(&mut self) {
        for row in self.ca.chunks_exact_mut(SynCaVar::COUNT) {
            KinaseCaParams::init_syn_ca(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_access() {
        let mut arr = SynapseArray::with_capacity(2, 4);
        assert_eq!(arr.push(0, 5, 0), 0);
        assert_eq!(arr.push(1, 5, 0), 1);
        arr.set(1, SynapseVar::LWt, 0.5);
        assert_eq!(arr.get(1, SynapseVar::LWt), 0.5);
        assert_eq!(arr.get(0, SynapseVar::LWt), 0.0);
        assert_eq!(arr.ca.len(), 2 * 2 * SynCaVar::COUNT);
        assert_eq!(arr.ca_row(1, 1).var(SynCaVar::CaUpT), -1.0);
        assert_eq!(arr.recv, vec![5, 5]);
    }

    #[test]
    fn test_out_of_range_is_nan() {
        let mut arr = SynapseArray::new(1);
        arr.push(0, 0, 0);
        assert!(arr.get_by_index(1, 0).is_nan());
        assert!(arr.get_by_index(0, SynapseVar::COUNT).is_nan());
        assert!(arr.get_ca_by_index(0, 1, 0).is_nan());
        assert_eq!(arr.get_ca_by_index(0, 0, SynCaVar::CaUpT.index()), -1.0);
    }
}
