// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Structural / Linear / Effective Weights
//!
//! Each synapse carries three weights related by
//! `Wt = SWt * contrast(LWt)`, where `contrast` is a sigmoid centred at 1
//! with range [0, 2]. `LWt` is the fast learned value in [0, 1], `SWt` the
//! slowly adapting structural value within `limit`. `Wt` is kept in [0, 1].

use serde::{Deserialize, Serialize};

use crate::types::{SynapseVar, VarRow};

/// Sigmoid on [0, 1] with gain and offset
#[inline]
pub fn sig_fun(w: f32, gain: f32, off: f32) -> f32 {
    if w <= 0.0 {
        return 0.0;
    }
    if w >= 1.0 {
        return 1.0;
    }
    let w = w as f64;
    (1.0 / (1.0 + ((off as f64 * (1.0 - w)) / w).powf(gain as f64))) as f32
}

/// [`sig_fun`] with gain 6 and offset 1
#[inline]
pub fn sig_fun61(w: f32) -> f32 {
    if w <= 0.0 {
        return 0.0;
    }
    if w >= 1.0 {
        return 1.0;
    }
    let w = w as f64;
    let pw = (1.0 - w) / w;
    (1.0 / (1.0 + pw * pw * pw * pw * pw * pw)) as f32
}

/// Inverse of [`sig_fun`]
#[inline]
pub fn sig_inv_fun(w: f32, gain: f32, off: f32) -> f32 {
    if w <= 0.0 {
        return 0.0;
    }
    if w >= 1.0 {
        return 1.0;
    }
    let w = w as f64;
    (1.0 / (1.0 + ((1.0 - w) / w).powf(1.0 / gain as f64) / off as f64)) as f32
}

/// Inverse of [`sig_fun61`]
#[inline]
pub fn sig_inv_fun61(w: f32) -> f32 {
    if w <= 0.0 {
        return 0.0;
    }
    if w >= 1.0 {
        return 1.0;
    }
    let w = w as f64;
    (1.0 / (1.0 + ((1.0 - w) / w).powf(1.0 / 6.0))) as f32
}

/// Random initialization of the weight triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SWtInitParams {
    /// Share of the initial random variance captured in SWt (rest goes to LWt)
    pub spct: f32,
    pub mean: f32,
    pub var: f32,
}

impl Default for SWtInitParams {
    fn default() -> Self {
        Self {
            spct: 0.5,
            mean: 0.5,
            var: 0.25,
        }
    }
}

impl SWtInitParams {
    /// Zero-mean variance from a uniform sample `rnd` in [0, 1)
    #[inline]
    pub fn rnd_var(&self, rnd: f32) -> f32 {
        self.var * 2.0 * (rnd - 0.5)
    }
}

/// Slow SWt adaptation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SWtAdaptParams {
    pub on: bool,
    /// Rate applied to accumulated DSWt at each slow pass
    pub lrate: f32,
    /// Amount of the per-receiver mean DSWt subtracted
    pub sub_mean: f32,
    /// Gain of the LWt → Wt contrast sigmoid
    pub sig_gain: f32,
}

impl Default for SWtAdaptParams {
    fn default() -> Self {
        Self {
            on: true,
            lrate: 0.1,
            sub_mean: 1.0,
            sig_gain: 6.0,
        }
    }
}

/// Closed interval limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub min: f32,
    pub max: f32,
}

impl Limit {
    #[inline]
    pub fn clip(&self, v: f32) -> f32 {
        v.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, v: f32) -> bool {
        v >= self.min && v <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SWtParams {
    pub init: SWtInitParams,
    pub adapt: SWtAdaptParams,
    pub limit: Limit,
}

impl Default for SWtParams {
    fn default() -> Self {
        Self {
            init: SWtInitParams::default(),
            adapt: SWtAdaptParams::default(),
            limit: Limit { min: 0.2, max: 0.8 },
        }
    }
}

#[inline]
fn clip01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

impl SWtParams {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.limit.min < 0.0 || self.limit.max > 1.0 || self.limit.min > self.limit.max {
            return Err("SWt limit must satisfy 0 <= min <= max <= 1");
        }
        if self.adapt.sig_gain <= 0.0 {
            return Err("sig_gain must be positive");
        }
        if !(0.0..=1.0).contains(&self.init.spct) {
            return Err("init.spct must be within [0, 1]");
        }
        Ok(())
    }

    /// Contrast-enhanced weight from linear weight, in [0, 2] centred at 1
    #[inline]
    pub fn sig_from_lin_wt(&self, lw: f32) -> f32 {
        let gain = self.adapt.sig_gain;
        let wt = if gain == 1.0 {
            lw
        } else if gain == 6.0 {
            sig_fun61(lw)
        } else {
            sig_fun(lw, gain, 1.0)
        };
        2.0 * wt
    }

    /// Linear weight in [0, 1] from a contrast-enhanced weight centred at 1
    #[inline]
    pub fn lin_from_sig_wt(&self, wt: f32) -> f32 {
        let wt = clip01(wt * 0.5);
        let gain = self.adapt.sig_gain;
        if gain == 1.0 {
            wt
        } else if gain == 6.0 {
            sig_inv_fun61(wt)
        } else {
            sig_inv_fun(wt, gain, 1.0)
        }
    }

    /// Effective weight from SWt and LWt
    #[inline]
    pub fn wt_val(&self, swt: f32, lwt: f32) -> f32 {
        clip01(swt * self.sig_from_lin_wt(lwt))
    }

    /// LWt that reproduces `wt` on top of `swt`
    #[inline]
    pub fn lwt_from_wts(&self, wt: f32, swt: f32) -> f32 {
        if swt <= 0.0 {
            return 0.0;
        }
        self.lin_from_sig_wt(wt / swt)
    }

    /// Seeds a synapse row from a uniform sample `rnd` in [0, 1)
    pub fn init_wts_syn(&self, syn: &mut [f32], rnd: f32, mean: f32, spct: f32) {
        let wtv = self.init.rnd_var(rnd);
        let wt = clip01(mean + wtv);
        let swt = if spct == 0.0 {
            0.5
        } else {
            self.limit.clip(mean + spct * wtv)
        };
        let lwt = self.lwt_from_wts(wt, swt);
        syn.set_var(SynapseVar::SWt, swt);
        syn.set_var(SynapseVar::LWt, lwt);
        syn.set_var(SynapseVar::Wt, self.wt_val(swt, lwt));
        syn.set_var(SynapseVar::DWt, 0.0);
        syn.set_var(SynapseVar::DSWt, 0.0);
    }

    /// End-of-trial weight update.
    ///
    /// With a zero DWt, a Wt of exactly zero is a synaptic failure from this
    /// step and is restored from SWt / LWt.
    #[inline]
    pub fn wt_from_dwt(&self, syn: &mut [f32]) {
        let dwt = syn.var(SynapseVar::DWt);
        syn.add_var(SynapseVar::DSWt, dwt);
        if dwt == 0.0 {
            if syn.var(SynapseVar::Wt) == 0.0 {
                let wt = self.wt_val(syn.var(SynapseVar::SWt), syn.var(SynapseVar::LWt));
                syn.set_var(SynapseVar::Wt, wt);
            }
            return;
        }
        let lwt = clip01(syn.var(SynapseVar::LWt) + dwt);
        syn.set_var(SynapseVar::LWt, lwt);
        syn.set_var(SynapseVar::Wt, self.wt_val(syn.var(SynapseVar::SWt), lwt));
        syn.set_var(SynapseVar::DWt, 0.0);
    }

    /// Soft-bounds DSWt against the SWt limits, in place. Returns the bounded value.
    #[inline]
    pub fn soft_bound_dswt(&self, syn: &mut [f32]) -> f32 {
        let dswt = syn.var(SynapseVar::DSWt);
        let swt = syn.var(SynapseVar::SWt);
        let bounded = if dswt >= 0.0 {
            dswt * (self.limit.max - swt)
        } else {
            dswt * (swt - self.limit.min)
        };
        syn.set_var(SynapseVar::DSWt, bounded);
        bounded
    }

    /// Applies the mean-subtracted SWt step and re-derives LWt and Wt
    #[inline]
    pub fn swt_from_dswt(&self, syn: &mut [f32], avg_dswt: f32) {
        let swt = self
            .limit
            .clip(syn.var(SynapseVar::SWt) + self.adapt.lrate * (syn.var(SynapseVar::DSWt) - avg_dswt));
        syn.set_var(SynapseVar::SWt, swt);
        syn.set_var(SynapseVar::DSWt, 0.0);
        if syn.var(SynapseVar::Wt) == 0.0 {
            let wt = self.wt_val(swt, syn.var(SynapseVar::LWt));
            syn.set_var(SynapseVar::Wt, wt);
        }
        let lwt = self.lwt_from_wts(syn.var(SynapseVar::Wt), swt);
        syn.set_var(SynapseVar::LWt, lwt);
        syn.set_var(SynapseVar::Wt, self.wt_val(swt, lwt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sig61_matches_general() {
        for i in 1..100 {
            let w = i as f32 / 100.0;
            assert!((sig_fun61(w) - sig_fun(w, 6.0, 1.0)).abs() < 1e-5);
            assert!((sig_inv_fun61(w) - sig_inv_fun(w, 6.0, 1.0)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_contrast_centred_at_one() {
        let params = SWtParams::default();
        assert!((params.sig_from_lin_wt(0.5) - 1.0).abs() < 1e-6);
        assert_eq!(params.sig_from_lin_wt(0.0), 0.0);
        assert_eq!(params.sig_from_lin_wt(1.0), 2.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        for gain in [1.0f32, 6.0, 3.0] {
            let mut params = SWtParams::default();
            params.adapt.sig_gain = gain;
            // at gain 6, 1 - wt drops below f32 resolution past 0.93
            let top = if gain == 6.0 { 94 } else { 96 };
            for i in 5..top {
                let lw = i as f32 / 100.0;
                let back = params.lin_from_sig_wt(params.sig_from_lin_wt(lw));
                assert!((back - lw).abs() < 1e-3, "gain {} lw {} back {}", gain, lw, back);
            }
        }
    }

    #[test]
    fn test_inverse_gain6_upper_tail() {
        let mut params = SWtParams::default();
        params.adapt.sig_gain = 6.0;
        let back = params.lin_from_sig_wt(params.sig_from_lin_wt(0.92));
        assert!((back - 0.92).abs() < 1e-3, "{}", back);
        let mut prev = back;
        for i in 93..100 {
            let back = params.lin_from_sig_wt(params.sig_from_lin_wt(i as f32 / 100.0));
            assert!(back >= prev && back <= 1.0, "lw 0.{} back {}", i, back);
            prev = back;
        }
    }

    #[test]
    fn test_init_reproduces_wt() {
        let params = SWtParams::default();
        let mut syn = vec![0.0; SynapseVar::COUNT];
        params.init_wts_syn(&mut syn, 0.9, 0.5, 0.5);
        // wt = 0.5 + 0.25 * 2 * 0.4 = 0.7, swt = 0.5 + 0.5 * 0.2 = 0.6
        assert!((syn.var(SynapseVar::SWt) - 0.6).abs() < 1e-6);
        assert!((syn.var(SynapseVar::Wt) - 0.7).abs() < 1e-3);

        params.init_wts_syn(&mut syn, 0.1, 0.5, 0.0);
        assert_eq!(syn.var(SynapseVar::SWt), 0.5);
    }

    #[test]
    fn test_restore_failed_weight() {
        let params = SWtParams::default();
        let mut syn = vec![0.0; SynapseVar::COUNT];
        params.init_wts_syn(&mut syn, 0.5, 0.5, 0.5);
        let wt = syn.var(SynapseVar::Wt);
        syn.set_var(SynapseVar::Wt, 0.0);
        params.wt_from_dwt(&mut syn);
        assert_eq!(syn.var(SynapseVar::Wt), wt);
    }

    #[test]
    fn test_soft_bound() {
        let params = SWtParams::default();
        let mut syn = vec![0.0; SynapseVar::COUNT];
        syn.set_var(SynapseVar::SWt, 0.8);
        syn.set_var(SynapseVar::DSWt, 1.0);
        assert_eq!(params.soft_bound_dswt(&mut syn), 0.0);
        syn.set_var(SynapseVar::DSWt, -1.0);
        assert!((params.soft_bound_dswt(&mut syn) + 0.6).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_weights_stay_bounded(
            rnd in 0.0f32..1.0,
            dwts in proptest::collection::vec(-2.0f32..2.0, 1..40),
            avg in -0.5f32..0.5,
        ) {
            let params = SWtParams::default();
            let mut syn = vec![0.0; SynapseVar::COUNT];
            params.init_wts_syn(&mut syn, rnd, 0.5, 0.5);
            for dwt in dwts {
                syn.set_var(SynapseVar::DWt, dwt);
                params.wt_from_dwt(&mut syn);
                params.soft_bound_dswt(&mut syn);
                params.swt_from_dswt(&mut syn, avg);
                prop_assert!(params.limit.contains(syn.var(SynapseVar::SWt)));
                prop_assert!((0.0..=1.0).contains(&syn.var(SynapseVar::LWt)));
                prop_assert!((0.0..=1.0).contains(&syn.var(SynapseVar::Wt)));
            }
        }
    }
}
