// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Convergence Scenario
//!
//! A 5x5 input layer fully connected to a 5x5 target layer learns a fixed
//! set of random sparse patterns.

use spikenet::config::SpikenetConfig;
use spikenet::prelude::*;
use spikenet::train::{association_net, configure};

const FINAL_WINDOW: usize = 10;

/// CorSim per epoch of the 5x5 association task
fn train_association(epochs: usize) -> Vec<f32> {
    let mut config = SpikenetConfig::default();
    config.engine.backend = "cpu".to_string();
    config.run.seed = 42;

    let builder = configure(NetworkBuilder::new("conv"), &config).unwrap();
    let mut net = association_net(builder, &[5, 5]).unwrap();

    let patterns = PatternSet::random(25, 25, 6, config.run.seed);
    let mut trainer = Trainer::new("Input", "Output", 43);
    (0..epochs)
        .map(|_| trainer.run_epoch(&mut net, &patterns, true).unwrap().cor_sim)
        .collect()
}

fn assert_converged(cor: &[f32]) {
    let tail = &cor[cor.len() - FINAL_WINDOW..];
    let mean = tail.iter().sum::<f32>() / FINAL_WINDOW as f32;
    assert!(
        mean >= 0.9,
        "CorSim over final {} epochs {:.3} (first epoch {:.3})",
        FINAL_WINDOW,
        mean,
        cor[0]
    );
    assert!(mean - cor[0] > 0.3, "no learning: {:.3} -> {:.3}", cor[0], mean);
}

#[test]
fn test_pattern_association_converges() {
    assert_converged(&train_association(30));
}

/// Full-length run; `cargo test --release --test convergence -- --ignored`
#[test]
#[ignore]
fn test_pattern_association_stays_converged() {
    assert_converged(&train_association(250));
}

#[test]
fn test_early_training_is_finite() {
    let mut config = SpikenetConfig::default();
    config.context.theta_cycles = 60;
    config.context.plus_cycles = 15;
    config.run.seed = 3;

    let builder = configure(NetworkBuilder::new("short"), &config).unwrap();
    let mut net = association_net(builder, &[5, 5]).unwrap();
    let patterns = PatternSet::random(25, 5, 6, 3);
    let mut trainer = Trainer::new("Input", "Output", 4);
    for _ in 0..3 {
        let epoch = trainer.run_epoch(&mut net, &patterns, true).unwrap();
        assert_eq!(epoch.trials, 5);
        assert!(epoch.cor_sim.is_finite());
        assert!(epoch.cor_sim.abs() <= 1.0 + 1e-5, "{}", epoch.cor_sim);
    }
    assert_eq!(trainer.stats.total_trials, 15);
    assert_eq!(trainer.stats.total_cycles, 15 * 60);
}
