// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulation clock shared by every per-cycle call.
//!
//! The network owns exactly one `Context`. It is passed by reference into
//! each phase; only the scheduler and the phase-level network methods mutate it.

use serde::{Deserialize, Serialize};

use crate::models::SynCaMode;

/// Minus (expectation) or plus (outcome) half of a theta cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ThetaPhase {
    #[default]
    Minus,
    Plus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Active data lanes (independent input patterns processed together)
    pub n_data: u32,

    /// Cycles in one theta window (trial)
    pub theta_cycles: i32,

    /// Current half of the theta window
    pub phase: ThetaPhase,

    /// Cycle within the current theta window
    pub cycle: i32,

    /// Cycles since the network was initialized
    pub cycles_total: i32,

    /// Synapse Ca clock, stored as f32 to share synapse rows
    pub syn_ca_ctr: f32,

    /// Trials started since initialization
    pub trial: u64,

    /// Testing trials skip homeostatic and learning bookkeeping
    pub testing: bool,

    pub syn_ca_mode: SynCaMode,

    /// Trials between slow adaptation passes
    pub slow_interval: i32,

    /// Trials since the last slow adaptation pass
    pub slow_ctr: i32,
}

impl Context {
    pub fn new(n_data: u32) -> Self {
        Self {
            n_data: n_data.max(1),
            theta_cycles: 200,
            phase: ThetaPhase::Minus,
            cycle: 0,
            cycles_total: 0,
            syn_ca_ctr: 0.0,
            trial: 0,
            testing: false,
            syn_ca_mode: SynCaMode::Event,
            slow_interval: 100,
            slow_ctr: 0,
        }
    }

    /// Resets the theta clock at the start of a trial
    pub fn new_state(&mut self, testing: bool) {
        self.cycle = 0;
        self.phase = ThetaPhase::Minus;
        self.testing = testing;
        self.trial += 1;
    }

    pub fn new_phase(&mut self, phase: ThetaPhase) {
        self.phase = phase;
    }

    pub fn is_plus_phase(&self) -> bool {
        self.phase == ThetaPhase::Plus
    }

    /// Advances every counter by one cycle
    pub fn cycle_inc(&mut self) {
        self.cycle += 1;
        self.cycles_total += 1;
        self.syn_ca_ctr += 1.0;
    }

    /// Counts one trial toward the slow adaptation interval.
    /// Returns true when a slow pass is due.
    pub fn slow_inc(&mut self) -> bool {
        self.slow_ctr += 1;
        if self.slow_ctr < self.slow_interval {
            return false;
        }
        self.slow_ctr = 0;
        true
    }

    /// Full reset back to the freshly built state
    pub fn reset(&mut self) {
        let n_data = self.n_data;
        let theta_cycles = self.theta_cycles;
        let syn_ca_mode = self.syn_ca_mode;
        let slow_interval = self.slow_interval;
        *self = Self::new(n_data);
        self.theta_cycles = theta_cycles;
        self.syn_ca_mode = syn_ca_mode;
        self.slow_interval = slow_interval;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(1)
    }
}
