// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event-driven vs continuous synapse calcium.
//!
//! Event mode skips cycles where neither neuron spiked and catches them up
//! as zero-input decay. These properties characterize how far that is from
//! integrating every cycle.

use proptest::prelude::*;
use spikenet_npu_neural::{
    CaSpkParams, KinaseCaParams, NeuronVar, SynCaMode, SynCaVar, VarRow,
};

struct Pair {
    send: Vec<f32>,
    recv: Vec<f32>,
    event: Vec<f32>,
    cont: Vec<f32>,
}

impl Pair {
    fn new() -> Self {
        let mut event = vec![0.0; SynCaVar::COUNT];
        let mut cont = vec![0.0; SynCaVar::COUNT];
        KinaseCaParams::init_syn_ca(&mut event);
        KinaseCaParams::init_syn_ca(&mut cont);
        Self {
            send: vec![0.0; NeuronVar::COUNT],
            recv: vec![0.0; NeuronVar::COUNT],
            event,
            cont,
        }
    }

    fn cycle(&mut self, ca_spk: &CaSpkParams, kinase: &KinaseCaParams, s: bool, r: bool, ctr: f32) {
        self.send.set_var(NeuronVar::Spike, if s { 1.0 } else { 0.0 });
        self.recv.set_var(NeuronVar::Spike, if r { 1.0 } else { 0.0 });
        ca_spk.ca_from_spike(&mut self.send);
        ca_spk.ca_from_spike(&mut self.recv);
        kinase.syn_ca_update(SynCaMode::Event, &mut self.event, &self.send, &self.recv, ctr);
        kinase.syn_ca_update(SynCaMode::Continuous, &mut self.cont, &self.send, &self.recv, ctr);
    }
}

fn spike_train(period: u32, phase: u32, n: usize) -> Vec<bool> {
    (0..n as u32).map(|t| period > 0 && (t + phase) % period == 0).collect()
}

#[test]
fn test_every_cycle_spiking_is_bit_identical() {
    let ca_spk = CaSpkParams::default();
    let kinase = KinaseCaParams::default();
    let mut pair = Pair::new();
    for t in 0..300 {
        pair.cycle(&ca_spk, &kinase, true, true, t as f32);
        assert_eq!(pair.event, pair.cont, "diverged at cycle {}", t);
    }
}

#[test]
fn test_sparse_spiking_underestimates() {
    // sparse spiking: event mode only integrates on spike cycles, so it
    // trails the continuous trace by a large margin
    let ca_spk = CaSpkParams::default();
    let kinase = KinaseCaParams::default();
    let mut pair = Pair::new();
    let n = 400;
    let s = spike_train(37, 0, n);
    let r = spike_train(41, 5, n);
    for t in 0..n {
        pair.cycle(&ca_spk, &kinase, s[t], r[t], t as f32);
    }
    let (_, ep, ed) = kinase.current_ca(&pair.event, n as f32);
    let (_, cp, cd) = kinase.current_ca(&pair.cont, n as f32);
    assert!(ep > 0.0, "event mode never updated");
    assert!(ep < cp && ed < cd);
}

proptest! {
    #[test]
    fn prop_event_never_exceeds_continuous(
        s_period in 1u32..20,
        r_period in 1u32..20,
        s_phase in 0u32..20,
        r_phase in 0u32..20,
        n in 50usize..400,
    ) {
        let ca_spk = CaSpkParams::default();
        let kinase = KinaseCaParams::default();
        let mut pair = Pair::new();
        let s = spike_train(s_period, s_phase, n);
        let r = spike_train(r_period, r_phase, n);
        for t in 0..n {
            pair.cycle(&ca_spk, &kinase, s[t], r[t], t as f32);
            let ctr = t as f32 + 1.0;
            let (em, ep, ed) = kinase.current_ca(&pair.event, ctr);
            let (cm, cp, cd) = kinase.current_ca(&pair.cont, ctr);
            // rounding slack scales with magnitude
            prop_assert!(em <= cm * (1.0 + 1e-5) + 1e-6);
            prop_assert!(ep <= cp * (1.0 + 1e-5) + 1e-6);
            prop_assert!(ed <= cd * (1.0 + 1e-5) + 1e-6);
        }
    }

    #[test]
    fn prop_high_rate_tracks_continuous(
        r_period in 1u32..4,
        n in 100usize..300,
    ) {
        // sender spikes every cycle, so every cycle is an update in both modes
        let ca_spk = CaSpkParams::default();
        let kinase = KinaseCaParams::default();
        let mut pair = Pair::new();
        let r = spike_train(r_period, 0, n);
        for t in 0..n {
            pair.cycle(&ca_spk, &kinase, true, r[t], t as f32);
        }
        prop_assert_eq!(&pair.event, &pair.cont);
    }
}
