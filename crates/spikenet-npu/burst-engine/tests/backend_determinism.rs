// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Backend Determinism Tests
//!
//! The same network, inputs and seed must give bit-identical neuron,
//! synapse and pool state on every backend and worker count. Each run must
//! also spike and learn, so identical state is not identical silence.

use spikenet_npu_burst_engine::*;
use spikenet_npu_neural::{SynCaMode, SynapseVar};
use spikenet_npu_runtime::{ConnParams, LayerKind, LayerParams, Pattern};

const MIN_SPIKES: u64 = 100;
const MIN_CHANGED_WTS: usize = 50;

fn build(backend: BackendType, workers: usize, syn_ca_mode: SynCaMode) -> Network {
    let mut lossy = ConnParams::default();
    lossy.com.p_fail = 0.2;
    let mut hidden = LayerParams::default();
    hidden.inhib.layer.gi = 0.7;
    hidden.inhib.pool.gi = 0.7;
    let config = BackendConfig {
        workers,
        workgroup_size: 7,
        ..BackendConfig::default()
    };
    NetworkBuilder::new("det")
        .n_data(2)
        .seed(1234)
        .theta_cycles(60)
        .plus_cycles(20)
        .slow_interval(2)
        .syn_ca_mode(syn_ca_mode)
        .backend(backend)
        .backend_config(config)
        .layer("In", &[4, 4], LayerKind::Input)
        .layer_with("Hid", &[2, 2, 3, 3], LayerKind::Hidden, hidden)
        .layer("Out", &[3, 3], LayerKind::Target)
        .lay_inhib("Out", &["Hid"])
        .connect("In", "Hid", Pattern::default())
        .connect_with("Hid", "Out", Pattern::default(), lossy)
        .connect("Out", "Hid", Pattern::default())
        .build()
        .unwrap()
}

fn pattern(k: usize, n: usize) -> ExtPattern {
    ExtPattern::flat((0..n).map(|i| ((i + k) % 3 == 0) as u8 as f32).collect())
}

/// Runs `trials` learning trials and returns the spike total
fn run(net: &mut Network, trials: usize) -> u64 {
    run_after(net, 0, trials)
}

/// Continues `run` from trial index `from`
fn run_after(net: &mut Network, from: usize, trials: usize) -> u64 {
    let mut spikes = 0;
    for t in from..from + trials {
        for di in 0..net.n_data() {
            net.apply_ext("In", di, &pattern(t + di, 16)).unwrap();
            net.apply_ext("Out", di, &pattern(t + 2 * di, 9)).unwrap();
        }
        spikes += run_trial(net, true).unwrap().spikes;
    }
    spikes
}

/// Synapses whose Wt differs from a freshly built copy
fn changed_wts(net: &Network, fresh: &Network) -> usize {
    (0..net.n_synapses())
        .filter(|&si| {
            net.synapses.get(si, SynapseVar::Wt) != fresh.synapses.get(si, SynapseVar::Wt)
        })
        .count()
}

fn assert_active(net: &Network, spikes: u64, syn_ca_mode: SynCaMode) {
    let fresh = build(BackendType::CPU, 1, syn_ca_mode);
    let changed = changed_wts(net, &fresh);
    assert!(spikes > MIN_SPIKES, "only {} spikes", spikes);
    assert!(changed >= MIN_CHANGED_WTS, "only {} weights changed", changed);
}

fn bits(v: &[f32]) -> Vec<u32> {
    v.iter().map(|x| x.to_bits()).collect()
}

fn assert_same(a: &Network, b: &Network) {
    assert_eq!(bits(&a.neurons.vals), bits(&b.neurons.vals), "neuron state");
    assert_eq!(bits(&a.neurons.avgs), bits(&b.neurons.avgs), "neuron averages");
    assert_eq!(bits(&a.synapses.vals), bits(&b.synapses.vals), "synapse state");
    assert_eq!(bits(&a.synapses.ca), bits(&b.synapses.ca), "synapse calcium");
    assert_eq!(bits(&a.pools.vals), bits(&b.pools.vals), "pool state");
}

#[test]
fn test_serial_cpu_kernel_identical() {
    let mut serial = build(BackendType::CPU, 1, SynCaMode::Event);
    serial.set_backend(Box::new(SerialBackend::new()));
    let mut cpu1 = build(BackendType::CPU, 1, SynCaMode::Event);
    let mut cpu4 = build(BackendType::CPU, 4, SynCaMode::Event);
    let mut kernel = build(BackendType::Kernel, 3, SynCaMode::Event);

    let spikes: Vec<u64> = [&mut serial, &mut cpu1, &mut cpu4, &mut kernel]
        .into_iter()
        .map(|net| run(net, 4))
        .collect();
    assert_active(&serial, spikes[0], SynCaMode::Event);
    assert!(spikes.iter().all(|&s| s == spikes[0]), "{:?}", spikes);
    assert_eq!(serial.backend_name(), "serial");
    assert_same(&serial, &cpu1);
    assert_same(&serial, &cpu4);
    assert_same(&serial, &kernel);
}

#[test]
fn test_continuous_mode_identical_across_backends() {
    let mut cpu = build(BackendType::CPU, 4, SynCaMode::Continuous);
    let mut kernel = build(BackendType::Kernel, 2, SynCaMode::Continuous);
    let spikes = run(&mut cpu, 3);
    assert_active(&cpu, spikes, SynCaMode::Continuous);
    assert_eq!(run(&mut kernel, 3), spikes);
    assert_same(&cpu, &kernel);
}

#[test]
fn test_backend_swap_mid_run() {
    let mut a = build(BackendType::CPU, 2, SynCaMode::Event);
    let mut b = build(BackendType::CPU, 2, SynCaMode::Event);
    let spikes = run(&mut a, 2);
    assert_active(&a, spikes, SynCaMode::Event);
    let mut b_spikes = run(&mut b, 1);
    b.set_backend(Box::new(KernelBackend::new(3, 5).unwrap()));
    b_spikes += run_after(&mut b, 1, 1);
    assert_eq!(b_spikes, spikes);
    assert_same(&a, &b);
}

#[test]
fn test_rebuild_same_seed_identical() {
    let mut a = build(BackendType::Auto, 0, SynCaMode::Event);
    let mut b = build(BackendType::Auto, 0, SynCaMode::Event);
    let spikes = run(&mut a, 2);
    assert_active(&a, spikes, SynCaMode::Event);
    assert_eq!(run(&mut b, 2), spikes);
    assert_same(&a, &b);
}
