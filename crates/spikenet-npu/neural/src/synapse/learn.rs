// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Learning parameters at the neuron and connection level

use serde::{Deserialize, Serialize};

use crate::models::{CaLrnParams, CaSpkParams, KinaseCaParams};
use crate::synapse::swt::Limit;

/// Effective learning rate = Base * Sched * Mod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LRateParams {
    pub base: f32,
    /// Schedule multiplier (e.g. decay over epochs)
    pub sched: f32,
    /// Dynamic modulation multiplier
    pub modulation: f32,
    #[serde(skip)]
    pub eff: f32,
}

impl LRateParams {
    pub fn update(&mut self) {
        self.eff = self.modulation * self.sched * self.base;
    }

    /// Resets both multipliers to 1
    pub fn init(&mut self) {
        self.sched = 1.0;
        self.modulation = 1.0;
        self.update();
    }
}

impl Default for LRateParams {
    fn default() -> Self {
        let mut p = Self {
            base: 0.04,
            sched: 1.0,
            modulation: 1.0,
            eff: 0.0,
        };
        p.update();
        p
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceParams {
    /// Proportion of the per-receiver mean nonzero DWt subtracted (1 = zero-sum)
    pub sub_mean: f32,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self { sub_mean: 0.0 }
    }
}

/// Receiver-side learning rate modulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RLRateParams {
    pub on: bool,
    /// Floor of the sigmoid-derivative factor (1 disables it)
    pub sigmoid_min: f32,
    /// Enable the activity-difference factor
    pub diff: bool,
    /// Below this max(CaSpkP, CaSpkD) the diff factor is at `min`
    pub spk_thr: f32,
    /// Below this |CaSpkP - CaSpkD| the diff factor is at `min`
    pub diff_thr: f32,
    pub min: f32,
}

impl Default for RLRateParams {
    fn default() -> Self {
        Self {
            on: true,
            sigmoid_min: 0.05,
            diff: true,
            spk_thr: 0.1,
            diff_thr: 0.02,
            min: 0.001,
        }
    }
}

impl RLRateParams {
    /// 4·a·(1−a) of the layer-normalized activity, floored at `sigmoid_min`
    #[inline]
    pub fn rlrate_sig_deriv(&self, act: f32, lay_max: f32) -> f32 {
        if !self.on || lay_max == 0.0 {
            return 1.0;
        }
        let ca = act / lay_max;
        (4.0 * ca * (1.0 - ca)).max(self.sigmoid_min)
    }

    /// |CaSpkP − CaSpkD| / max(CaSpkP, CaSpkD), floored at `min`
    #[inline]
    pub fn rlrate_diff(&self, scap: f32, scad: f32) -> f32 {
        if !self.on || !self.diff {
            return 1.0;
        }
        let smax = scap.max(scad);
        if smax > self.spk_thr {
            let dif = (scap - scad).abs();
            if dif < self.diff_thr {
                return self.min;
            }
            return dif / smax;
        }
        self.min
    }
}

/// Per-neuron target activity used by synaptic scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrgAvgActParams {
    pub on: bool,
    /// Rate of TrgAvg adjustment from the neuron's CaSpkP − CaSpkD error
    pub err_lrate: f32,
    pub syn_scale_rate: f32,
    /// Proportion of the population mean DTrgAvg subtracted
    pub sub_mean: f32,
    /// Shuffle the initial TrgAvg assignment within a layer
    pub permute: bool,
    /// Use sub-pools for TrgAvg normalization in 4D layers
    pub pool: bool,
    pub trg_range: Limit,
}

impl Default for TrgAvgActParams {
    fn default() -> Self {
        Self {
            on: true,
            err_lrate: 0.02,
            syn_scale_rate: 0.005,
            sub_mean: 1.0,
            permute: true,
            pool: true,
            trg_range: Limit { min: 0.5, max: 2.0 },
        }
    }
}

/// Neuron-level learning parameters for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnNeurParams {
    pub ca_lrn: CaLrnParams,
    pub ca_spk: CaSpkParams,
    pub trg_avg_act: TrgAvgActParams,
    pub rl_rate: RLRateParams,
}

impl Default for LearnNeurParams {
    fn default() -> Self {
        Self {
            ca_lrn: CaLrnParams::default(),
            ca_spk: CaSpkParams::default(),
            trg_avg_act: TrgAvgActParams::default(),
            rl_rate: RLRateParams::default(),
        }
    }
}

impl LearnNeurParams {
    pub fn update(&mut self) {
        self.ca_lrn.update();
        self.ca_spk.update();
    }

    /// Per-cycle neuron Ca: spike-driven CaSyn/CaSpk, then learning Ca
    #[inline]
    pub fn ca_from_spike(&self, nrn: &mut [f32]) {
        self.ca_spk.ca_from_spike(nrn);
        self.ca_lrn.ca_lrn(nrn);
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.ca_spk.cascade.validate()?;
        self.ca_lrn.cascade.validate()?;
        if self.ca_lrn.norm <= 0.0 {
            return Err("ca_lrn.norm must be positive");
        }
        if self.rl_rate.spk_thr <= 0.0 {
            return Err("rl_rate.spk_thr must be positive");
        }
        Ok(())
    }
}

/// Connection-level learning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnSynParams {
    pub learn: bool,
    pub lrate: LRateParams,
    pub trace: TraceParams,
    pub kinase_ca: KinaseCaParams,
}

impl Default for LearnSynParams {
    fn default() -> Self {
        Self {
            learn: true,
            lrate: LRateParams::default(),
            trace: TraceParams::default(),
            kinase_ca: KinaseCaParams::default(),
        }
    }
}

impl LearnSynParams {
    pub fn update(&mut self) {
        self.lrate.update();
        self.kinase_ca.update();
    }

    /// DWt for one synapse lane from its current CaP / CaD
    #[inline]
    pub fn dwt(&self, ca_p: f32, ca_d: f32, rlrate: f32) -> f32 {
        self.lrate.eff * rlrate * (ca_p - ca_d)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.kinase_ca.cascade.validate()?;
        if self.lrate.base < 0.0 {
            return Err("lrate.base must be non-negative");
        }
        if self.kinase_ca.max_isi < 1 {
            return Err("kinase_ca.max_isi must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lrate_eff() {
        let mut lr = LRateParams::default();
        lr.sched = 0.5;
        lr.modulation = 0.5;
        lr.update();
        assert!((lr.eff - 0.01).abs() < 1e-7);
        lr.init();
        assert!((lr.eff - 0.04).abs() < 1e-7);
    }

    #[test]
    fn test_rlrate_sig_deriv_peaks_mid_range() {
        let rl = RLRateParams::default();
        assert_eq!(rl.rlrate_sig_deriv(0.5, 1.0), 1.0);
        assert_eq!(rl.rlrate_sig_deriv(1.0, 1.0), 0.05);
        assert_eq!(rl.rlrate_sig_deriv(0.3, 0.0), 1.0);
        assert!(rl.rlrate_sig_deriv(0.2, 1.0) < rl.rlrate_sig_deriv(0.4, 1.0));
    }

    #[test]
    fn test_rlrate_diff() {
        let rl = RLRateParams::default();
        assert_eq!(rl.rlrate_diff(0.05, 0.01), 0.001);
        assert_eq!(rl.rlrate_diff(0.5, 0.49), 0.001);
        assert!((rl.rlrate_diff(0.5, 0.25) - 0.5).abs() < 1e-6);
        let off = RLRateParams {
            diff: false,
            ..RLRateParams::default()
        };
        assert_eq!(off.rlrate_diff(0.5, 0.25), 1.0);
    }

    #[test]
    fn test_dwt_sign() {
        let ls = LearnSynParams::default();
        assert!(ls.dwt(0.6, 0.4, 1.0) > 0.0);
        assert!(ls.dwt(0.4, 0.6, 1.0) < 0.0);
        assert_eq!(ls.dwt(0.6, 0.4, 0.0), 0.0);
    }
}
