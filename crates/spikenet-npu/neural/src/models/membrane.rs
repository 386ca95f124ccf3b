// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Membrane / Spike Model
//!
//! Normalized adaptive-exponential integrate-and-fire dynamics. All voltages
//! are in normalized units where `0` maps to -100mV and `1` to 0mV; channel
//! code that needs biological voltage converts with [`vm_to_bio`].
//!
//! Per cycle, a neuron row goes through:
//! 1. [`ActParams::ge_from_raw`]: excitatory synaptic, NMDA and clamp conductance
//! 2. [`ActParams::gi_from_raw`]: pool inhibition plus explicit inhibitory input
//! 3. [`ActParams::gk_from_spike`]: sodium-gated potassium adaptation
//! 4. [`ActParams::vm_from_g`]: membrane integration, spike, ISI and rate code
//!
//! Every function operates on a single neuron/lane row and never reads
//! another neuron's state.

use serde::{Deserialize, Serialize};

use crate::types::{NeuronVar, VarRow};

/// Biological membrane voltage (mV) from normalized Vm
#[inline]
pub fn vm_to_bio(vm: f32) -> f32 {
    100.0 * vm - 100.0
}

/// Reversal potentials or maximal conductances for the four channel classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chans {
    /// Excitatory
    pub e: f32,
    /// Leak
    pub l: f32,
    /// Inhibitory
    pub i: f32,
    /// Potassium
    pub k: f32,
}

/// Spiking threshold and rate-code parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeParams {
    /// Threshold for the exponential term (or for spiking when `exp` is off)
    pub thr: f32,
    /// Post-spike reset potential
    pub vm_r: f32,
    /// Refractory period in cycles
    pub tr: i32,
    /// Enable the AdEx exponential term
    pub exp: bool,
    pub exp_slope: f32,
    /// Spike threshold when `exp` is on
    pub exp_thr: f32,
    /// Firing rate mapped to Act = 1
    pub max_hz: f32,
    pub isi_tau: f32,

    #[serde(skip)]
    pub isi_dt: f32,
    /// Cycles-per-spike at `max_hz`
    #[serde(skip)]
    pub max_isi_rate: f32,
}

impl SpikeParams {
    pub fn update(&mut self) {
        self.isi_dt = 1.0 / self.isi_tau;
        self.max_isi_rate = 1000.0 / self.max_hz;
    }

    /// Rate-code activation from the running ISI average
    #[inline]
    pub fn act_from_isi(&self, isi_avg: f32) -> f32 {
        if isi_avg <= 0.0 {
            return 0.0;
        }
        (self.max_isi_rate / isi_avg).min(1.0)
    }

    /// ISI bookkeeping. Sentinels: ISIAvg -1 never spiked, -2 one spike seen.
    #[inline]
    pub fn avg_from_isi(&self, nrn: &mut [f32], spiked: bool) {
        let isi = nrn.var(NeuronVar::Isi);
        let mut avg = nrn.var(NeuronVar::IsiAvg);
        if spiked {
            if avg == -1.0 {
                avg = -2.0;
            } else if isi > 0.0 {
                if avg == -2.0 {
                    avg = isi;
                } else {
                    avg += self.isi_dt * (isi - avg);
                }
            }
            nrn.set_var(NeuronVar::Isi, 0.0);
        } else {
            let isi = if isi >= 0.0 { isi + 1.0 } else { isi };
            nrn.set_var(NeuronVar::Isi, isi);
            // a long silence pulls the rate down before the next spike arrives
            if avg > 0.0 && isi > 1.2 * avg {
                avg += self.isi_dt * (isi - avg);
            }
        }
        nrn.set_var(NeuronVar::IsiAvg, avg);
    }
}

impl Default for SpikeParams {
    fn default() -> Self {
        let mut p = Self {
            thr: 0.5,
            vm_r: 0.3,
            tr: 3,
            exp: true,
            exp_slope: 0.02,
            exp_thr: 0.9,
            max_hz: 180.0,
            isi_tau: 5.0,
            isi_dt: 0.0,
            max_isi_rate: 0.0,
        };
        p.update();
        p
    }
}

/// Integration time constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtParams {
    pub vm_tau: f32,
    /// Sub-steps per cycle for Vm integration
    pub vm_steps: i32,
    pub ge_tau: f32,
    pub gi_tau: f32,
    pub act_tau: f32,
    /// ActInt integration, sampled into ActM / ActP
    pub int_tau: f32,
    /// Trial-level ActAvg integration
    pub long_avg_tau: f32,

    #[serde(skip)]
    pub vm_dt: f32,
    #[serde(skip)]
    pub ge_dt: f32,
    #[serde(skip)]
    pub gi_dt: f32,
    #[serde(skip)]
    pub act_dt: f32,
    #[serde(skip)]
    pub int_dt: f32,
    #[serde(skip)]
    pub long_avg_dt: f32,
}

impl DtParams {
    pub fn update(&mut self) {
        self.vm_steps = self.vm_steps.max(1);
        self.vm_dt = 1.0 / (self.vm_tau * self.vm_steps as f32);
        self.ge_dt = 1.0 / self.ge_tau;
        self.gi_dt = 1.0 / self.gi_tau;
        self.act_dt = 1.0 / self.act_tau;
        self.int_dt = 1.0 / self.int_tau;
        self.long_avg_dt = 1.0 / self.long_avg_tau;
    }

    /// Running average and variance update used by trial statistics
    #[inline]
    pub fn avg_var_update(&self, avg: &mut f32, var: &mut f32, val: f32) {
        if *avg == 0.0 {
            *avg = val;
            *var = 0.0;
            return;
        }
        let del = val - *avg;
        let incr = self.long_avg_dt * del;
        *avg += incr;
        if *var == 0.0 {
            *var = 2.0 * (1.0 - self.long_avg_dt) * del * incr;
        } else {
            *var = (1.0 - self.long_avg_dt) * (*var + del * incr);
        }
    }
}

impl Default for DtParams {
    fn default() -> Self {
        let mut p = Self {
            vm_tau: 2.81,
            vm_steps: 2,
            ge_tau: 5.0,
            gi_tau: 7.0,
            act_tau: 3.0,
            int_tau: 40.0,
            long_avg_tau: 20.0,
            vm_dt: 0.0,
            ge_dt: 0.0,
            gi_dt: 0.0,
            act_dt: 0.0,
            int_dt: 0.0,
            long_avg_dt: 0.0,
        };
        p.update();
        p
    }
}

/// External input clamping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClampParams {
    /// Target layers receive `Target` as `Ext` in the plus phase
    pub is_target: bool,
    /// Input layers are clamped in both phases
    pub is_input: bool,
    /// Conductance per unit of Ext
    pub ge: f32,
    /// Add clamp conductance to synaptic input instead of replacing it
    pub add: bool,
}

impl Default for ClampParams {
    fn default() -> Self {
        Self {
            is_target: false,
            is_input: false,
            ge: 0.8,
            add: false,
        }
    }
}

/// One sodium-gated potassium channel (rise on spike, decay otherwise)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KNaParams {
    pub on: bool,
    pub rise: f32,
    pub max: f32,
    pub tau: f32,
    #[serde(skip)]
    pub dt: f32,
}

impl KNaParams {
    fn new(rise: f32, max: f32, tau: f32) -> Self {
        Self {
            on: true,
            rise,
            max,
            tau,
            dt: 1.0 / tau,
        }
    }

    pub fn update(&mut self) {
        self.dt = 1.0 / self.tau;
    }

    #[inline]
    pub fn gk_from_spike(&self, gkna: f32, spike: bool) -> f32 {
        if !self.on {
            return 0.0;
        }
        if spike {
            gkna + self.rise * (self.max - gkna)
        } else {
            gkna - self.dt * gkna
        }
    }
}

impl Default for KNaParams {
    fn default() -> Self {
        Self::new(0.02, 0.2, 200.0)
    }
}

/// Medium and slow KNa adaptation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KNaMedSlow {
    pub on: bool,
    pub med: KNaParams,
    pub slow: KNaParams,
}

impl Default for KNaMedSlow {
    fn default() -> Self {
        Self {
            on: true,
            med: KNaParams::new(0.02, 0.2, 200.0),
            slow: KNaParams::new(0.001, 0.2, 1000.0),
        }
    }
}

/// NMDA receptor conductance and its Ca contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmdaParams {
    pub gbar: f32,
    pub tau: f32,
    /// Extracellular magnesium (mM)
    pub mg_c: f32,

    #[serde(skip)]
    pub dt: f32,
    #[serde(skip)]
    pub mg_fact: f32,
}

impl NmdaParams {
    pub fn update(&mut self) {
        self.dt = 1.0 / self.tau;
        self.mg_fact = self.mg_c / 3.57;
    }

    /// Magnesium block at biological voltage `v`
    #[inline]
    pub fn mg_block(&self, v: f32) -> f32 {
        1.0 / (1.0 + self.mg_fact * (-0.062 * v).exp())
    }

    /// Ca driving force at biological voltage `v`
    #[inline]
    pub fn ca_from_v(&self, v: f32) -> f32 {
        if v > -0.1 && v < 0.1 {
            return 1.0 / (0.0756 + 0.5 * v);
        }
        -v / (1.0 - (0.0756 * v).exp())
    }
}

impl Default for NmdaParams {
    fn default() -> Self {
        let mut p = Self {
            gbar: 0.006,
            tau: 100.0,
            mg_c: 1.0,
            dt: 0.0,
            mg_fact: 0.0,
        };
        p.update();
        p
    }
}

/// Membrane potential bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VmRange {
    pub min: f32,
    pub max: f32,
}

impl VmRange {
    #[inline]
    pub fn clip(&self, vm: f32) -> f32 {
        vm.clamp(self.min, self.max)
    }
}

/// Between-trial state decay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayParams {
    /// Proportion of activation and conductance state removed at NewState
    pub act: f32,
    /// Proportion of slow conductances (NMDA, KNa) removed
    pub glong: f32,
    /// Also decay the neuron-level Ca cascades
    pub ca: bool,
}

impl Default for DecayParams {
    fn default() -> Self {
        Self {
            act: 0.2,
            glong: 0.6,
            ca: false,
        }
    }
}

/// All per-neuron activation parameters for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActParams {
    pub spike: SpikeParams,
    pub dt: DtParams,
    pub gbar: Chans,
    pub erev: Chans,
    pub clamp: ClampParams,
    pub kna: KNaMedSlow,
    pub nmda: NmdaParams,
    pub decay: DecayParams,
    pub vm_range: VmRange,
    /// Initial and decay-target membrane potential
    pub init_vm: f32,
}

impl Default for ActParams {
    fn default() -> Self {
        Self {
            spike: SpikeParams::default(),
            dt: DtParams::default(),
            gbar: Chans {
                e: 1.0,
                l: 0.2,
                i: 1.0,
                k: 1.0,
            },
            erev: Chans {
                e: 1.0,
                l: 0.3,
                i: 0.1,
                k: 0.1,
            },
            clamp: ClampParams::default(),
            kna: KNaMedSlow::default(),
            nmda: NmdaParams::default(),
            decay: DecayParams::default(),
            vm_range: VmRange { min: 0.1, max: 1.0 },
            init_vm: 0.3,
        }
    }
}

impl ActParams {
    /// Recomputes every derived rate
    pub fn update(&mut self) {
        self.spike.update();
        self.dt.update();
        self.kna.med.update();
        self.kna.slow.update();
        self.nmda.update();
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.dt.vm_tau <= 0.0 || self.dt.ge_tau <= 0.0 || self.dt.gi_tau <= 0.0 {
            return Err("membrane time constants must be positive");
        }
        if self.spike.max_hz <= 0.0 {
            return Err("max_hz must be positive");
        }
        if self.vm_range.min >= self.vm_range.max {
            return Err("vm_range min must be below max");
        }
        if !(0.0..=1.0).contains(&self.decay.act) || !(0.0..=1.0).contains(&self.decay.glong) {
            return Err("decay proportions must be within [0, 1]");
        }
        Ok(())
    }

    /// Resets a neuron/lane row to its resting state
    pub fn init_act_vars(&self, nrn: &mut [f32]) {
        nrn.fill(0.0);
        nrn.set_var(NeuronVar::Vm, self.init_vm);
        nrn.set_var(NeuronVar::Isi, -1.0);
        nrn.set_var(NeuronVar::IsiAvg, -1.0);
    }

    /// Proportional decay of activation, conductance and (optionally) Ca state
    pub fn decay_state(&self, nrn: &mut [f32], decay: f32, glong: f32) {
        if decay > 0.0 {
            for v in [
                NeuronVar::Act,
                NeuronVar::ActInt,
                NeuronVar::Ge,
                NeuronVar::Gi,
                NeuronVar::GeSyn,
                NeuronVar::GiSyn,
                NeuronVar::GeExt,
            ] {
                nrn.add_var(v, -decay * nrn.var(v));
            }
            let vm = nrn.var(NeuronVar::Vm);
            nrn.set_var(NeuronVar::Vm, vm - decay * (vm - self.init_vm));
        }
        if glong > 0.0 {
            for v in [
                NeuronVar::GnmdaSyn,
                NeuronVar::Gnmda,
                NeuronVar::GknaMed,
                NeuronVar::GknaSlow,
                NeuronVar::Gk,
            ] {
                nrn.add_var(v, -glong * nrn.var(v));
            }
        }
        if self.decay.ca && decay > 0.0 {
            for v in [
                NeuronVar::CaSyn,
                NeuronVar::CaSpkM,
                NeuronVar::CaSpkP,
                NeuronVar::CaSpkD,
                NeuronVar::NrnCaM,
                NeuronVar::NrnCaP,
                NeuronVar::NrnCaD,
                NeuronVar::NmdaCa,
                NeuronVar::VgccCaInt,
            ] {
                nrn.add_var(v, -decay * nrn.var(v));
            }
        }
        if decay >= 1.0 {
            nrn.set_var(NeuronVar::Isi, -1.0);
            nrn.set_var(NeuronVar::IsiAvg, -1.0);
        }
        nrn.set_var(NeuronVar::Spike, 0.0);
        nrn.set_var(NeuronVar::Spiked, 0.0);
        nrn.set_var(NeuronVar::Inet, 0.0);
        nrn.set_var(NeuronVar::GeRaw, 0.0);
        nrn.set_var(NeuronVar::GiRaw, 0.0);
    }

    /// Integrates GeSyn and NMDA from this cycle's GeRaw and applies clamping.
    /// `clamped` is true for neurons carrying external input.
    #[inline]
    pub fn ge_from_raw(&self, nrn: &mut [f32], clamped: bool) {
        let ge_raw = nrn.var(NeuronVar::GeRaw);
        let ge_syn = nrn.var(NeuronVar::GeSyn);
        let ge_syn = ge_syn + ge_raw - self.dt.ge_dt * ge_syn;
        nrn.set_var(NeuronVar::GeSyn, ge_syn);

        let v = vm_to_bio(nrn.var(NeuronVar::Vm));
        let nmda_syn = nrn.var(NeuronVar::GnmdaSyn);
        let nmda_syn = nmda_syn + ge_raw - self.nmda.dt * nmda_syn;
        nrn.set_var(NeuronVar::GnmdaSyn, nmda_syn);
        let gnmda = self.nmda.gbar * nmda_syn * self.nmda.mg_block(v);
        nrn.set_var(NeuronVar::Gnmda, gnmda);
        nrn.set_var(NeuronVar::NmdaCa, gnmda * self.nmda.ca_from_v(v));

        let ge = if clamped {
            let ge_ext = nrn.var(NeuronVar::Ext) * self.clamp.ge;
            nrn.set_var(NeuronVar::GeExt, ge_ext);
            if self.clamp.add {
                ge_syn + ge_ext
            } else {
                ge_ext
            }
        } else {
            nrn.set_var(NeuronVar::GeExt, 0.0);
            ge_syn
        };
        nrn.set_var(NeuronVar::Ge, ge + gnmda);
    }

    /// Total inhibition: pool Gi plus explicit inhibitory synaptic input
    #[inline]
    pub fn gi_from_raw(&self, nrn: &mut [f32], pool_gi: f32) {
        let gi_raw = nrn.var(NeuronVar::GiRaw);
        let gi_syn = nrn.var(NeuronVar::GiSyn);
        let gi_syn = (gi_syn + gi_raw - self.dt.gi_dt * gi_syn).max(0.0);
        nrn.set_var(NeuronVar::GiSyn, gi_syn);
        nrn.set_var(NeuronVar::Gi, pool_gi + gi_syn);
    }

    /// KNa adaptation driven by the previous cycle's spike
    #[inline]
    pub fn gk_from_spike(&self, nrn: &mut [f32]) {
        if !self.kna.on {
            nrn.set_var(NeuronVar::Gk, 0.0);
            return;
        }
        let spike = nrn.var(NeuronVar::Spike) > 0.0;
        let med = self.kna.med.gk_from_spike(nrn.var(NeuronVar::GknaMed), spike);
        let slow = self.kna.slow.gk_from_spike(nrn.var(NeuronVar::GknaSlow), spike);
        nrn.set_var(NeuronVar::GknaMed, med);
        nrn.set_var(NeuronVar::GknaSlow, slow);
        nrn.set_var(NeuronVar::Gk, med + slow);
    }

    /// Net current at `vm` given total conductances
    #[inline]
    pub fn inet_from_g(&self, vm: f32, ge: f32, gi: f32, gk: f32) -> f32 {
        let mut inet = ge * self.gbar.e * (self.erev.e - vm)
            + self.gbar.l * (self.erev.l - vm)
            + gi * self.gbar.i * (self.erev.i - vm)
            + gk * self.gbar.k * (self.erev.k - vm);
        if self.spike.exp {
            let exp_arg = (vm - self.spike.thr) / self.spike.exp_slope;
            inet += self.gbar.l * self.spike.exp_slope * exp_arg.exp();
        }
        inet
    }

    /// Integrates Vm, emits a spike, and updates ISI and the rate code
    #[inline]
    pub fn vm_from_g(&self, nrn: &mut [f32]) {
        let isi = nrn.var(NeuronVar::Isi);
        let refractory = isi >= 0.0 && isi < self.spike.tr as f32;

        let mut vm = nrn.var(NeuronVar::Vm);
        let mut inet = 0.0;
        if refractory {
            vm = self.spike.vm_r;
        } else {
            let ge = nrn.var(NeuronVar::Ge);
            let gi = nrn.var(NeuronVar::Gi);
            let gk = nrn.var(NeuronVar::Gk);
            for _ in 0..self.dt.vm_steps {
                inet = self.inet_from_g(vm, ge, gi, gk);
                vm = self.vm_range.clip(vm + self.dt.vm_dt * inet);
            }
        }
        nrn.set_var(NeuronVar::Inet, inet);

        let thr = if self.spike.exp {
            self.spike.exp_thr
        } else {
            self.spike.thr
        };
        let spiked = !refractory && vm > thr;
        if spiked {
            vm = self.spike.vm_r;
            nrn.set_var(NeuronVar::Spike, 1.0);
            nrn.set_var(NeuronVar::Spiked, 1.0);
        } else {
            nrn.set_var(NeuronVar::Spike, 0.0);
            if !refractory {
                nrn.set_var(NeuronVar::Spiked, 0.0);
            }
        }
        nrn.set_var(NeuronVar::Vm, vm);
        self.spike.avg_from_isi(nrn, spiked);

        let act_new = self.spike.act_from_isi(nrn.var(NeuronVar::IsiAvg));
        let act = nrn.var(NeuronVar::Act);
        let act = act + self.dt.act_dt * (act_new - act);
        nrn.set_var(NeuronVar::Act, act);
        let act_int = nrn.var(NeuronVar::ActInt);
        nrn.set_var(NeuronVar::ActInt, act_int + self.dt.int_dt * (act - act_int));
    }

    /// Full membrane update for one cycle
    #[inline]
    pub fn cycle_neuron(&self, nrn: &mut [f32], pool_gi: f32, clamped: bool) {
        self.ge_from_raw(nrn, clamped);
        self.gi_from_raw(nrn, pool_gi);
        self.gk_from_spike(nrn);
        self.vm_from_g(nrn);
    }
}
