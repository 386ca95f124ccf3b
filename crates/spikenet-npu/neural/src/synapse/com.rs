// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike communication: delay, integer conductance encoding, scaling and
//! stochastic transmission failure

use serde::{Deserialize, Serialize};

use crate::types::{SynapseVar, VarRow};

/// Fixed-point factor for the conductance ring buffer
pub const GBUF_INT_FACTOR: f32 = (1u32 << 20) as f32;

/// Which conductance a connection drives on its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Accumulates into GeRaw
    #[default]
    Excitatory,
    /// Accumulates into GiRaw
    Inhibitory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComParams {
    pub kind: ConnectionKind,
    /// Transmission delay in cycles (>= 1)
    pub delay: u32,
    /// Probability of transmission failure per synapse per trial
    pub p_fail: f32,
    /// Scale failure probability by (1 - SWt)
    pub p_fail_swt: bool,
}

impl Default for ComParams {
    fn default() -> Self {
        Self {
            kind: ConnectionKind::Excitatory,
            delay: 2,
            p_fail: 0.0,
            p_fail_swt: false,
        }
    }
}

impl ComParams {
    /// Ring buffer slots per receiving neuron
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.delay + 1
    }

    /// Slot read by the gather on cycle `cycle`
    #[inline]
    pub fn read_slot(&self, cycle: i32) -> usize {
        (cycle.max(0) as u32 % self.capacity()) as usize
    }

    /// Slot written by spikes emitted on cycle `cycle`, read `delay` cycles later
    #[inline]
    pub fn write_slot(&self, cycle: i32) -> usize {
        ((cycle.max(0) as u32 + self.delay) % self.capacity()) as usize
    }

    #[inline]
    pub fn float_to_int(v: f32) -> i32 {
        (v * GBUF_INT_FACTOR) as i32
    }

    #[inline]
    pub fn int_to_float(v: i32) -> f32 {
        v as f32 / GBUF_INT_FACTOR
    }

    /// Marks a synapse as failed for this trial when `rnd` (uniform in [0, 1))
    /// falls under the failure probability
    #[inline]
    pub fn fail(&self, syn: &mut [f32], rnd: f32) {
        if self.p_fail <= 0.0 {
            return;
        }
        let mut pf = self.p_fail;
        if self.p_fail_swt {
            pf *= 1.0 - syn.var(SynapseVar::SWt);
        }
        if rnd < pf {
            syn.set_var(SynapseVar::Wt, 0.0);
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.delay == 0 {
            return Err("delay must be at least one cycle");
        }
        if !(0.0..=1.0).contains(&self.p_fail) {
            return Err("p_fail must be within [0, 1]");
        }
        Ok(())
    }
}

/// Absolute and relative connection strength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrjnScale {
    pub abs: f32,
    /// Normalized against the other connections of the same kind into the receiver
    pub rel: f32,
}

impl Default for PrjnScale {
    fn default() -> Self {
        Self { abs: 1.0, rel: 1.0 }
    }
}

impl PrjnScale {
    /// 1 / expected number of active senders per receiving neuron.
    ///
    /// `savg` is the sending layer's nominal activity, `snu` its size and
    /// `ncon` the mean number of connections per receiver. Partial
    /// connectivity adds two standard errors of slack.
    pub fn slay_act_scale(savg: f32, snu: f32, ncon: f32) -> f32 {
        const SEM_EXTRA: i32 = 2;
        let ncon = ncon.max(1.0);
        let slay_act_n = ((savg * snu).round() as i32).max(1);
        if ncon == snu {
            return 1.0 / slay_act_n as f32;
        }
        let max_act_n = (ncon.min(slay_act_n as f32) as i32).max(1);
        let avg_act_n = ((savg * ncon).round() as i32).max(1);
        let exp_act_n = (avg_act_n + SEM_EXTRA).min(max_act_n);
        1.0 / exp_act_n as f32
    }

    /// Final conductance scale given the summed `rel` of all same-kind
    /// connections into the receiver
    pub fn gscale(&self, savg: f32, snu: f32, ncon: f32, sum_rel: f32) -> f32 {
        if sum_rel <= 0.0 {
            return 0.0;
        }
        self.abs * (self.rel / sum_rel) * Self::slay_act_scale(savg, snu, ncon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_slots() {
        let com = ComParams::default();
        assert_eq!(com.capacity(), 3);
        // written at t, read at t + delay
        for t in 0..10 {
            assert_eq!(com.write_slot(t), com.read_slot(t + 2));
        }
    }

    #[test]
    fn test_int_encoding() {
        let v = 0.123_456;
        let back = ComParams::int_to_float(ComParams::float_to_int(v));
        assert!((back - v).abs() < 1.0 / GBUF_INT_FACTOR * 2.0);
    }

    #[test]
    fn test_slay_act_scale() {
        // full connectivity: 1 / round(0.2 * 25) = 1 / 5
        assert!((PrjnScale::slay_act_scale(0.2, 25.0, 25.0) - 0.2).abs() < 1e-6);
        // partial: avg 0.2 * 10 = 2 active, +2 slack, capped at 5
        assert!((PrjnScale::slay_act_scale(0.2, 25.0, 10.0) - 0.25).abs() < 1e-6);
        // one-to-one: ncon 1
        assert_eq!(PrjnScale::slay_act_scale(0.2, 25.0, 1.0), 1.0);
    }

    #[test]
    fn test_gscale_rel_normalization() {
        let a = PrjnScale { abs: 1.0, rel: 1.0 };
        let b = PrjnScale { abs: 1.0, rel: 3.0 };
        let ga = a.gscale(0.2, 25.0, 25.0, 4.0);
        let gb = b.gscale(0.2, 25.0, 25.0, 4.0);
        assert!((gb / ga - 3.0).abs() < 1e-5);
        assert_eq!(a.gscale(0.2, 25.0, 25.0, 0.0), 0.0);
    }

    #[test]
    fn test_fail() {
        let com = ComParams {
            p_fail: 0.5,
            ..ComParams::default()
        };
        let mut syn = vec![0.0; SynapseVar::COUNT];
        syn.set_var(SynapseVar::Wt, 0.4);
        com.fail(&mut syn, 0.7);
        assert_eq!(syn.var(SynapseVar::Wt), 0.4);
        com.fail(&mut syn, 0.2);
        assert_eq!(syn.var(SynapseVar::Wt), 0.0);
    }
}
