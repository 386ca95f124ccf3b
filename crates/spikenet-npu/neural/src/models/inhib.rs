// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Pooled FFFB Inhibition
//!
//! Fast-spiking (FS) and slow-spiking (SS) feedforward / feedback inhibition
//! computed from pool-level aggregates. The Gi produced here on cycle `t` is
//! consumed by the membrane update on cycle `t + 1`.
//!
//! All functions take a pool row laid out by [`PoolVar`].

use serde::{Deserialize, Serialize};

use crate::types::{PoolVar, VarRow};

/// FS-FFFB parameters for one inhibition level (layer or sub-pool)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiParams {
    pub on: bool,
    /// Overall gain on FS and SS terms
    pub gi: f32,
    /// Weight of feedback spikes in the FS drive
    pub fb: f32,
    pub fs_tau: f32,
    /// Multiplier on the SS term
    pub ss: f32,
    pub ssf_tau: f32,
    pub ssi_tau: f32,
    /// FS zero point
    pub fs0: f32,
    pub ff_avg_tau: f32,
    /// Proportion of the previous trial's FFAvg added to Gi
    pub ff_prv: f32,
    /// GeExts level above which clamped pools use external input alone
    pub clamp_ext_min: f32,

    #[serde(skip)]
    pub fs_dt: f32,
    #[serde(skip)]
    pub ssf_dt: f32,
    #[serde(skip)]
    pub ssi_dt: f32,
    #[serde(skip)]
    pub ff_avg_dt: f32,
}

impl GiParams {
    pub fn update(&mut self) {
        self.fs_dt = 1.0 / self.fs_tau;
        self.ssf_dt = 1.0 / self.ssf_tau;
        self.ssi_dt = 1.0 / self.ssi_tau;
        self.ff_avg_dt = 1.0 / self.ff_avg_tau;
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.fs_tau <= 0.0 || self.ssf_tau <= 0.0 || self.ssi_tau <= 0.0 || self.ff_avg_tau <= 0.0 {
            return Err("FFFB time constants must be positive");
        }
        if self.gi < 0.0 || self.fb < 0.0 || self.ss < 0.0 {
            return Err("FFFB gains must be non-negative");
        }
        Ok(())
    }

    /// Off parameters: Gi is always exactly zero
    pub fn off() -> Self {
        Self {
            on: false,
            ..Self::default()
        }
    }

    #[inline]
    fn fs0_thr(&self, fsi: f32) -> f32 {
        (fsi - self.fs0).max(0.0)
    }

    /// FS term, bypassing the FS0 threshold for clamped pools
    #[inline]
    pub fn fs(&self, fsi: f32, gext: f32, clamped: bool) -> f32 {
        if clamped && gext > self.clamp_ext_min {
            return gext;
        }
        self.fs0_thr(fsi) + gext
    }

    /// Integrates the pool's inhibition state from its current FFs / FBs /
    /// GeExts and writes Gi and GiOrig
    #[inline]
    pub fn inhib(&self, pl: &mut [f32], gi_mult: f32) {
        if !self.on {
            zero_inhib(pl);
            return;
        }
        let ffs = pl.var(PoolVar::FFs);
        let fbs = pl.var(PoolVar::FBs);

        let ff_avg = pl.var(PoolVar::FFAvg);
        pl.set_var(PoolVar::FFAvg, ff_avg + self.ff_avg_dt * (ffs - ff_avg));

        let fsi = pl.var(PoolVar::FSi);
        let fsi = fsi + (ffs + self.fb * fbs) - self.fs_dt * fsi;
        pl.set_var(PoolVar::FSi, fsi);
        let clamped = pl.var(PoolVar::Clamped) > 0.0;
        let fs_gi = self.gi * self.fs(fsi, pl.var(PoolVar::GeExts), clamped);
        pl.set_var(PoolVar::FSGi, fs_gi);

        let ssf = pl.var(PoolVar::SSf);
        let ssi = pl.var(PoolVar::SSi);
        let ssi = ssi + self.ssi_dt * (ssf * fbs - ssi);
        let ssf = ssf + fbs * (1.0 - ssf) - self.ssf_dt * ssf;
        pl.set_var(PoolVar::SSi, ssi);
        pl.set_var(PoolVar::SSf, ssf);
        let ss_gi = self.gi * self.ss * ssi;
        pl.set_var(PoolVar::SSGi, ss_gi);

        let gi = (fs_gi + ss_gi + self.ff_prv * pl.var(PoolVar::FFAvgPrv)) * gi_mult;
        pl.set_var(PoolVar::Gi, gi);
        pl.set_var(PoolVar::GiOrig, gi);
    }
}

impl Default for GiParams {
    fn default() -> Self {
        let mut p = Self {
            on: true,
            gi: 1.1,
            fb: 1.0,
            fs_tau: 6.0,
            ss: 30.0,
            ssf_tau: 20.0,
            ssi_tau: 50.0,
            fs0: 0.1,
            ff_avg_tau: 50.0,
            ff_prv: 0.0,
            clamp_ext_min: 0.05,
            fs_dt: 0.0,
            ssf_dt: 0.0,
            ssi_dt: 0.0,
            ff_avg_dt: 0.0,
        };
        p.update();
        p
    }
}

/// Clears every inhibition integrator in a pool row
#[inline]
pub fn zero_inhib(pl: &mut [f32]) {
    for v in [
        PoolVar::FSi,
        PoolVar::SSi,
        PoolVar::SSf,
        PoolVar::FSGi,
        PoolVar::SSGi,
        PoolVar::Gi,
        PoolVar::GiOrig,
        PoolVar::LayGi,
        PoolVar::FFAvg,
    ] {
        pl.set_var(v, 0.0);
    }
}

/// Proportional decay of the inhibition integrators between trials
pub fn decay_inhib(pl: &mut [f32], decay: f32) {
    for v in [
        PoolVar::FSi,
        PoolVar::SSi,
        PoolVar::SSf,
        PoolVar::FSGi,
        PoolVar::SSGi,
        PoolVar::Gi,
        PoolVar::GiOrig,
        PoolVar::FFs,
        PoolVar::FBs,
        PoolVar::GeExts,
    ] {
        pl.add_var(v, -decay * pl.var(v));
    }
}

/// Slow background inhibition tracking the FFFB level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgParams {
    pub on: bool,
    /// GiBg target as a proportion of FFFB Gi
    pub gi: f32,
    pub tau: f32,
    #[serde(skip)]
    pub dt: f32,
}

impl BgParams {
    pub fn update(&mut self) {
        self.dt = 1.0 / self.tau;
    }

    #[inline]
    pub fn gi_bg(&self, gibg: f32, gi: f32) -> f32 {
        if !self.on {
            return 0.0;
        }
        gibg + self.dt * (self.gi * gi - gibg)
    }
}

impl Default for BgParams {
    fn default() -> Self {
        Self {
            on: false,
            gi: 0.1,
            tau: 10.0,
            dt: 0.1,
        }
    }
}

/// Nominal activity level and optional adaptive inhibition gain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActAvgParams {
    /// Expected proportion of active neurons; drives GScale and TrgAvg init
    pub nominal: f32,
    pub adapt_gi: bool,
    pub offset: f32,
    pub hi_tol: f32,
    pub lo_tol: f32,
    pub adapt_rate: f32,
    /// Time constant of the layer-level ActMAvg / ActPAvg running averages (trials)
    pub avg_tau: f32,
    #[serde(skip)]
    pub avg_dt: f32,
}

impl ActAvgParams {
    pub fn update(&mut self) {
        self.avg_dt = 1.0 / self.avg_tau;
    }

    /// Adapts `gi_mult` toward the nominal activity level.
    /// Returns true when an adjustment was made.
    pub fn adapt(&self, gi_mult: &mut f32, act: f32) -> bool {
        let trg = self.nominal + self.offset;
        if trg <= 0.0 {
            return false;
        }
        let del = (act - trg) / trg;
        if del < -self.lo_tol || del > self.hi_tol {
            *gi_mult += self.adapt_rate * del;
            return true;
        }
        false
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.nominal <= 0.0 || self.nominal > 1.0 {
            return Err("nominal activity must be within (0, 1]");
        }
        if self.avg_tau <= 0.0 {
            return Err("avg_tau must be positive");
        }
        Ok(())
    }
}

impl Default for ActAvgParams {
    fn default() -> Self {
        Self {
            nominal: 0.1,
            adapt_gi: false,
            offset: 0.0,
            hi_tol: 0.0,
            lo_tol: 0.8,
            adapt_rate: 0.1,
            avg_tau: 200.0,
            avg_dt: 1.0 / 200.0,
        }
    }
}

/// All inhibition parameters for one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InhibParams {
    pub layer: GiParams,
    /// Sub-pool inhibition (4D layers only)
    pub pool: GiParams,
    pub bg: BgParams,
    pub act_avg: ActAvgParams,
}

impl Default for InhibParams {
    fn default() -> Self {
        Self {
            layer: GiParams::default(),
            pool: GiParams::off(),
            bg: BgParams::default(),
            act_avg: ActAvgParams::default(),
        }
    }
}

impl InhibParams {
    pub fn update(&mut self) {
        self.layer.update();
        self.pool.update();
        self.bg.update();
        self.act_avg.update();
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.layer.validate()?;
        self.pool.validate()?;
        self.act_avg.validate()
    }

    /// Sub-pool Gi combined with the already final layer Gi
    #[inline]
    pub fn sub_pool_gi(&self, pl: &mut [f32], lay_gi: f32, gi_mult: f32) {
        self.pool.inhib(pl, gi_mult);
        pl.set_var(PoolVar::LayGi, lay_gi);
        if self.layer.on {
            let gi = pl.var(PoolVar::Gi).max(lay_gi);
            pl.set_var(PoolVar::Gi, gi);
        }
    }
}
