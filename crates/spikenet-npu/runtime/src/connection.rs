// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connection (projection) descriptor
//!
//! A connection owns a contiguous synapse range in the network arena,
//! sorted by sender, plus two indexes over it:
//! - `send_con[s]`: the run of synapses leaving sending neuron `s`
//! - `recv_con[r]`: the run of `recv_syn_idx` entries arriving at receiver `r`

use serde::{Deserialize, Serialize};
use spikenet_npu_neural::{ComParams, ConnectionKind, LearnSynParams, PrjnScale, SWtParams};

use crate::gbuf::GBuf;
use crate::pattern::Pattern;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConnParams {
    pub com: ComParams,
    pub scale: PrjnScale,
    pub swt: SWtParams,
    pub learn: LearnSynParams,
}

impl ConnParams {
    pub fn update(&mut self) {
        self.learn.update();
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.com.validate()?;
        self.swt.validate()?;
        self.learn.validate()
    }
}

/// A contiguous run: `start..start + n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartN {
    pub start: u32,
    pub n: u32,
}

impl StartN {
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.n) as usize
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    /// `"<send>To<recv>"` unless given explicitly
    pub name: String,
    pub index: usize,

    /// Sending layer
    pub send: usize,
    /// Receiving layer
    pub recv: usize,

    pub pattern: Pattern,
    pub params: ConnParams,

    /// First synapse in the network arena
    pub syn_st: usize,
    pub n_syns: usize,

    /// Per sending neuron (layer-local), absolute synapse run
    pub send_con: Vec<StartN>,

    /// Per receiving neuron (layer-local), run into `recv_syn_idx`
    pub recv_con: Vec<StartN>,

    /// Absolute synapse indices ordered by receiver
    pub recv_syn_idx: Vec<u32>,

    pub gbuf: GBuf,

    /// Conductance scale applied on scatter
    pub gscale: f32,
}

impl Connection {
    #[inline]
    pub fn kind(&self) -> ConnectionKind {
        self.params.com.kind
    }

    #[inline]
    pub fn synapses(&self) -> std::ops::Range<usize> {
        self.syn_st..self.syn_st + self.n_syns
    }

    /// Builds `send_con`, `recv_con` and `recv_syn_idx` from sender-ordered
    /// local pairs whose synapses start at `syn_st`
    pub fn index_pairs(&mut self, pairs: &[(u32, u32)], n_send: usize, n_recv: usize) {
        self.send_con = vec![StartN::default(); n_send];
        let mut recv_n = vec![0u32; n_recv];
        for (k, &(s, r)) in pairs.iter().enumerate() {
            let sc = &mut self.send_con[s as usize];
            if sc.n == 0 {
                sc.start = (self.syn_st + k) as u32;
            }
            sc.n += 1;
            recv_n[r as usize] += 1;
        }

        self.recv_con = Vec::with_capacity(n_recv);
        let mut start = 0u32;
        for &n in &recv_n {
            self.recv_con.push(StartN { start, n });
            start += n;
        }

        // stable fill keeps each receiver's synapses in sender order
        let mut fill = vec![0u32; n_recv];
        self.recv_syn_idx = vec![0; pairs.len()];
        for (k, &(_, r)) in pairs.iter().enumerate() {
            let r = r as usize;
            let at = (self.recv_con[r].start + fill[r]) as usize;
            self.recv_syn_idx[at] = (self.syn_st + k) as u32;
            fill[r] += 1;
        }
        self.n_syns = pairs.len();
    }
}
