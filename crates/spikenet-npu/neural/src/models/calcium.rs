// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Calcium Cascades
//!
//! Three cascaded exponential integrators (M → P → D, fast to slow) appear at
//! three places:
//!
//! - neuron spike Ca: `CaSpkM/P/D`, driven by `SpikeG * Spike`
//! - neuron learning Ca: `NrnCaM/P/D`, driven by NMDA and VGCC Ca (`CaLrn`)
//! - synapse Ca: `CaM/P/D`, driven by the product of sender and receiver `CaSyn`
//!
//! The synapse cascade supports an event-driven mode that only touches a
//! synapse when one of its neurons spikes and catches up the missed cycles as
//! zero-input decay.

use serde::{Deserialize, Serialize};

use crate::types::{NeuronVar, SynCaVar, VarRow};

/// How synapse-level Ca is integrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SynCaMode {
    /// Update only on sender or receiver spikes, with catch-up decay
    #[default]
    Event,
    /// Update every synapse every cycle
    Continuous,
}

impl std::str::FromStr for SynCaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "event" => Ok(SynCaMode::Event),
            "continuous" => Ok(SynCaMode::Continuous),
            other => Err(format!("unknown synapse Ca mode '{}'", other)),
        }
    }
}

/// Time constants of an M → P → D cascade, in cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaCascadeParams {
    pub m_tau: f32,
    pub p_tau: f32,
    pub d_tau: f32,

    #[serde(skip)]
    pub m_dt: f32,
    #[serde(skip)]
    pub p_dt: f32,
    #[serde(skip)]
    pub d_dt: f32,
}

impl CaCascadeParams {
    pub fn new(m_tau: f32, p_tau: f32, d_tau: f32) -> Self {
        let mut p = Self {
            m_tau,
            p_tau,
            d_tau,
            m_dt: 0.0,
            p_dt: 0.0,
            d_dt: 0.0,
        };
        p.update();
        p
    }

    pub fn update(&mut self) {
        self.m_dt = 1.0 / self.m_tau;
        self.p_dt = 1.0 / self.p_tau;
        self.d_dt = 1.0 / self.d_tau;
    }

    /// One integration step of the cascade from input `ca`
    #[inline]
    pub fn from_ca(&self, ca: f32, ca_m: &mut f32, ca_p: &mut f32, ca_d: &mut f32) {
        *ca_m += self.m_dt * (ca - *ca_m);
        *ca_p += self.p_dt * (*ca_m - *ca_p);
        *ca_d += self.d_dt * (*ca_p - *ca_d);
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.m_tau < 1.0 || self.p_tau < 1.0 || self.d_tau < 1.0 {
            return Err("Ca time constants must be >= 1 cycle");
        }
        Ok(())
    }
}

impl Default for CaCascadeParams {
    fn default() -> Self {
        Self::new(5.0, 40.0, 40.0)
    }
}

/// Neuron-level spike-driven Ca (`CaSyn`, `CaSpkM/P/D`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaSpkParams {
    /// Gain applied to the spike before integration
    pub spike_g: f32,

    /// Time constant of `CaSyn`, the input to synapse-level Ca
    pub syn_tau: f32,

    #[serde(skip)]
    pub syn_dt: f32,

    pub cascade: CaCascadeParams,
}

impl CaSpkParams {
    pub fn update(&mut self) {
        self.syn_dt = 1.0 / self.syn_tau;
        self.cascade.update();
    }

    /// Integrates `CaSyn` and the `CaSpk` cascade from the current spike
    #[inline]
    pub fn ca_from_spike(&self, nrn: &mut [f32]) {
        let nsp = self.spike_g * nrn.var(NeuronVar::Spike);
        let ca_syn = nrn.var(NeuronVar::CaSyn);
        nrn.set_var(NeuronVar::CaSyn, ca_syn + self.syn_dt * (nsp - ca_syn));

        let mut m = nrn.var(NeuronVar::CaSpkM);
        let mut p = nrn.var(NeuronVar::CaSpkP);
        let mut d = nrn.var(NeuronVar::CaSpkD);
        self.cascade.from_ca(nsp, &mut m, &mut p, &mut d);
        nrn.set_var(NeuronVar::CaSpkM, m);
        nrn.set_var(NeuronVar::CaSpkP, p);
        nrn.set_var(NeuronVar::CaSpkD, d);
    }
}

impl Default for CaSpkParams {
    fn default() -> Self {
        let mut p = Self {
            spike_g: 8.0,
            syn_tau: 30.0,
            syn_dt: 0.0,
            cascade: CaCascadeParams::new(5.0, 40.0, 40.0),
        };
        p.update();
        p
    }
}

/// Neuron-level learning Ca from NMDA and voltage-gated channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaLrnParams {
    /// Denominator normalizing raw channel Ca into `CaLrn`
    pub norm: f32,

    /// Use a spike-triggered VGCC pulse instead of a voltage-dependent current
    pub spk_vgcc: bool,

    /// VGCC Ca contributed per spike
    pub spk_vgcc_ca: f32,

    pub vgcc_tau: f32,

    #[serde(skip)]
    pub vgcc_dt: f32,

    pub cascade: CaCascadeParams,
}

impl CaLrnParams {
    pub fn update(&mut self) {
        self.vgcc_dt = 1.0 / self.vgcc_tau;
        self.cascade.update();
    }

    #[inline]
    pub fn vgcc_from_spike(&self, nrn: &mut [f32]) {
        if self.spk_vgcc {
            nrn.set_var(NeuronVar::VgccCa, self.spk_vgcc_ca * nrn.var(NeuronVar::Spike));
        }
        let int = nrn.var(NeuronVar::VgccCaInt);
        nrn.set_var(
            NeuronVar::VgccCaInt,
            int + nrn.var(NeuronVar::VgccCa) - self.vgcc_dt * int,
        );
    }

    /// Updates `CaLrn`, the `NrnCa` cascade and `CaDiff`
    #[inline]
    pub fn ca_lrn(&self, nrn: &mut [f32]) {
        self.vgcc_from_spike(nrn);
        let ca_lrn = (nrn.var(NeuronVar::NmdaCa) + nrn.var(NeuronVar::VgccCaInt)) / self.norm;
        nrn.set_var(NeuronVar::CaLrn, ca_lrn);

        let mut m = nrn.var(NeuronVar::NrnCaM);
        let mut p = nrn.var(NeuronVar::NrnCaP);
        let mut d = nrn.var(NeuronVar::NrnCaD);
        self.cascade.from_ca(ca_lrn, &mut m, &mut p, &mut d);
        nrn.set_var(NeuronVar::NrnCaM, m);
        nrn.set_var(NeuronVar::NrnCaP, p);
        nrn.set_var(NeuronVar::NrnCaD, d);
        nrn.set_var(NeuronVar::CaDiff, p - d);
    }
}

impl Default for CaLrnParams {
    fn default() -> Self {
        let mut p = Self {
            norm: 80.0,
            spk_vgcc: true,
            spk_vgcc_ca: 35.0,
            vgcc_tau: 10.0,
            vgcc_dt: 0.0,
            cascade: CaCascadeParams::new(2.0, 40.0, 40.0),
        };
        p.update();
        p
    }
}

/// Synapse-level Ca cascade parameters (one set per connection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinaseCaParams {
    /// Gain on the product of sender and receiver `CaSyn`
    pub spike_g: f32,

    pub cascade: CaCascadeParams,

    /// Event mode skips synapses whose neurons both have CaSpkP and CaSpkD
    /// below this level
    pub updt_thr: f32,

    /// Catch-up gaps longer than this reset the cascade to zero
    pub max_isi: i32,
}

impl KinaseCaParams {
    pub fn update(&mut self) {
        self.cascade.update();
    }

    /// True when a neuron is active enough to take part in event updates
    #[inline]
    pub fn above_thr(&self, nrn: &[f32]) -> bool {
        nrn.var(NeuronVar::CaSpkP) >= self.updt_thr || nrn.var(NeuronVar::CaSpkD) >= self.updt_thr
    }

    /// Decays `(m, p, d)` from `utime` forward to `ctime` with zero input.
    /// A negative `utime` means never updated.
    #[inline]
    pub fn cur_ca(&self, ctime: f32, utime: f32, m: &mut f32, p: &mut f32, d: &mut f32) {
        if utime < 0.0 {
            return;
        }
        let isi = (ctime - utime) as i32;
        if isi <= 0 {
            return;
        }
        if isi > self.max_isi {
            *m = 0.0;
            *p = 0.0;
            *d = 0.0;
            return;
        }
        for _ in 0..isi {
            self.cascade.from_ca(0.0, m, p, d);
        }
    }

    /// Catches up to the previous cycle, then integrates `ca` for cycle `ctr`
    #[inline]
    pub fn step(&self, syn_ca: &mut [f32], ca: f32, ctr: f32) {
        let mut m = syn_ca.var(SynCaVar::CaM);
        let mut p = syn_ca.var(SynCaVar::CaP);
        let mut d = syn_ca.var(SynCaVar::CaD);
        self.cur_ca(ctr - 1.0, syn_ca.var(SynCaVar::CaUpT), &mut m, &mut p, &mut d);
        self.cascade.from_ca(ca, &mut m, &mut p, &mut d);
        syn_ca.set_var(SynCaVar::CaM, m);
        syn_ca.set_var(SynCaVar::CaP, p);
        syn_ca.set_var(SynCaVar::CaD, d);
        syn_ca.set_var(SynCaVar::CaUpT, ctr);
    }

    /// Per-cycle synapse Ca update for one synapse in one lane.
    ///
    /// In event mode a synapse is touched once when its sender or its
    /// receiver (or both) spiked this cycle, so a synapse whose sender spiked
    /// is never updated a second time from the receiver side.
    #[inline]
    pub fn syn_ca_update(
        &self,
        mode: SynCaMode,
        syn_ca: &mut [f32],
        send: &[f32],
        recv: &[f32],
        ctr: f32,
    ) {
        if mode == SynCaMode::Event {
            if send.var(NeuronVar::Spike) == 0.0 && recv.var(NeuronVar::Spike) == 0.0 {
                return;
            }
            if !self.above_thr(send) || !self.above_thr(recv) {
                return;
            }
        }
        let ca = self.spike_g * send.var(NeuronVar::CaSyn) * recv.var(NeuronVar::CaSyn);
        self.step(syn_ca, ca, ctr);
    }

    /// Current `(CaM, CaP, CaD)` as of the last completed cycle, without
    /// writing the catch-up back
    #[inline]
    pub fn current_ca(&self, syn_ca: &[f32], ctr: f32) -> (f32, f32, f32) {
        let mut m = syn_ca.var(SynCaVar::CaM);
        let mut p = syn_ca.var(SynCaVar::CaP);
        let mut d = syn_ca.var(SynCaVar::CaD);
        self.cur_ca(ctr - 1.0, syn_ca.var(SynCaVar::CaUpT), &mut m, &mut p, &mut d);
        (m, p, d)
    }

    /// Clears one synapse-lane Ca row
    pub fn init_syn_ca(syn_ca: &mut [f32]) {
        syn_ca.set_var(SynCaVar::CaM, 0.0);
        syn_ca.set_var(SynCaVar::CaP, 0.0);
        syn_ca.set_var(SynCaVar::CaD, 0.0);
        syn_ca.set_var(SynCaVar::CaUpT, -1.0);
    }
}

impl Default for KinaseCaParams {
    fn default() -> Self {
        Self {
            spike_g: 8.0,
            cascade: CaCascadeParams::new(5.0, 40.0, 40.0),
            updt_thr: 0.01,
            max_isi: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Vec<f32> {
        vec![0.0; NeuronVar::COUNT]
    }

    /// First cycle at which `trace` reaches 63% of `target`
    fn rise_time(trace: &[f32], target: f32) -> usize {
        trace
            .iter()
            .position(|v| *v >= 0.63 * target)
            .unwrap_or(trace.len())
    }

    fn run_rate(period: usize, cycles: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        let params = CaSpkParams::default();
        let mut nrn = row();
        let (mut m, mut p, mut d) = (Vec::new(), Vec::new(), Vec::new());
        for t in 0..cycles {
            let spike = if t % period == 0 { 1.0 } else { 0.0 };
            nrn.set_var(NeuronVar::Spike, spike);
            params.ca_from_spike(&mut nrn);
            m.push(nrn.var(NeuronVar::CaSpkM));
            p.push(nrn.var(NeuronVar::CaSpkP));
            d.push(nrn.var(NeuronVar::CaSpkD));
        }
        (m, p, d)
    }

    #[test]
    fn test_cascade_lag_ordering() {
        for period in [1usize, 3, 7] {
            let cycles = 2000;
            let (m, p, d) = run_rate(period, cycles);
            // asymptote is the long-run mean drive
            let tail = &d[cycles - 200..];
            let asym = tail.iter().sum::<f32>() / tail.len() as f32;
            let tm = rise_time(&m, asym);
            let tp = rise_time(&p, asym);
            let td = rise_time(&d, asym);
            assert!(tm <= tp, "period {}: M {} > P {}", period, tm, tp);
            assert!(tp <= td, "period {}: P {} > D {}", period, tp, td);
        }
    }

    #[test]
    fn test_ca_lrn_from_vgcc() {
        let params = CaLrnParams::default();
        let mut nrn = row();
        nrn.set_var(NeuronVar::Spike, 1.0);
        params.ca_lrn(&mut nrn);
        assert_eq!(nrn.var(NeuronVar::VgccCa), 35.0);
        assert_eq!(nrn.var(NeuronVar::VgccCaInt), 35.0);
        assert!((nrn.var(NeuronVar::CaLrn) - 35.0 / 80.0).abs() < 1e-6);
        assert!(nrn.var(NeuronVar::NrnCaM) > nrn.var(NeuronVar::NrnCaP));
        assert!(nrn.var(NeuronVar::CaDiff) > 0.0);
    }

    #[test]
    fn test_cur_ca_decay_and_reset() {
        let params = KinaseCaParams::default();
        let (mut m, mut p, mut d) = (1.0, 1.0, 1.0);
        params.cur_ca(10.0, 10.0, &mut m, &mut p, &mut d);
        assert_eq!((m, p, d), (1.0, 1.0, 1.0));

        params.cur_ca(12.0, 10.0, &mut m, &mut p, &mut d);
        assert!(m < 1.0);

        let (mut m, mut p, mut d) = (1.0, 1.0, 1.0);
        params.cur_ca(500.0, 10.0, &mut m, &mut p, &mut d);
        assert_eq!((m, p, d), (0.0, 0.0, 0.0));

        let (mut m, mut p, mut d) = (1.0, 1.0, 1.0);
        params.cur_ca(500.0, -1.0, &mut m, &mut p, &mut d);
        assert_eq!((m, p, d), (1.0, 1.0, 1.0));
    }

    #[test]
    fn test_event_skips_quiet_synapse() {
        let params = KinaseCaParams::default();
        let mut syn = vec![0.0; SynCaVar::COUNT];
        KinaseCaParams::init_syn_ca(&mut syn);
        let mut send = row();
        let recv = row();
        send.set_var(NeuronVar::CaSyn, 1.0);
        params.syn_ca_update(SynCaMode::Event, &mut syn, &send, &recv, 0.0);
        assert_eq!(syn.var(SynCaVar::CaUpT), -1.0);

        // spiking but below the gating threshold
        send.set_var(NeuronVar::Spike, 1.0);
        params.syn_ca_update(SynCaMode::Event, &mut syn, &send, &recv, 1.0);
        assert_eq!(syn.var(SynCaVar::CaUpT), -1.0);

        params.syn_ca_update(SynCaMode::Continuous, &mut syn, &send, &recv, 2.0);
        assert_eq!(syn.var(SynCaVar::CaUpT), 2.0);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Event".parse::<SynCaMode>(), Ok(SynCaMode::Event));
        assert_eq!("continuous".parse::<SynCaMode>(), Ok(SynCaMode::Continuous));
        assert!("sometimes".parse::<SynCaMode>().is_err());
    }
}
