// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pattern-association training loop shared by `spikenet-train` and the
//! workspace scenario tests.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use spikenet_config::SpikenetConfig;
use spikenet_npu_burst_engine::{
    run_trial, BackendConfig, BackendType, EngineStats, ExtPattern, Network, NetworkBuilder,
};
use spikenet_npu_neural::{NetError, Result, SynCaMode};
use spikenet_npu_runtime::{LayerKind, LayerParams, Pattern};

/// Layer inhibition gain of the association target layer. The target has to
/// fire in the minus phase for its CaP - CaD to carry an error signal.
pub const ASSOC_TARGET_GI: f32 = 0.65;

fn to_i32(field: &str, v: u32) -> Result<i32> {
    i32::try_from(v).map_err(|_| NetError::InvalidParameter(format!("{} = {} is too large", field, v)))
}

/// Applies the `[engine]`, `[context]` and `[run]` seed settings to a builder
pub fn configure(builder: NetworkBuilder, config: &SpikenetConfig) -> Result<NetworkBuilder> {
    let backend: BackendType = config.engine.backend.parse()?;
    let syn_ca_mode: SynCaMode = config
        .context
        .syn_ca_mode
        .parse()
        .map_err(NetError::InvalidParameter)?;
    let backend_config = BackendConfig {
        workers: config.engine.workers,
        workgroup_size: config.engine.workgroup_size,
        kernel_synapse_threshold: config.engine.kernel_synapse_threshold,
        kernel_neuron_threshold: config.engine.kernel_neuron_threshold,
        ..BackendConfig::default()
    };
    let ctx = &config.context;
    Ok(builder
        .n_data(ctx.n_data)
        .seed(config.run.seed)
        .theta_cycles(to_i32("theta_cycles", ctx.theta_cycles)?)
        .plus_cycles(to_i32("plus_cycles", ctx.plus_cycles)?)
        .slow_interval(to_i32("slow_interval", ctx.slow_interval)?)
        .syn_ca_mode(syn_ca_mode)
        .backend(backend)
        .backend_config(backend_config))
}

/// An `Input` layer fully connected to a same-shaped `Output` target layer
pub fn association_net(builder: NetworkBuilder, dims: &[usize]) -> Result<Network> {
    let mut target = LayerParams::for_kind(LayerKind::Target);
    target.inhib.layer.gi = ASSOC_TARGET_GI;
    builder
        .layer("Input", dims, LayerKind::Input)
        .layer_with("Output", dims, LayerKind::Target, target)
        .connect("Input", "Output", Pattern::default())
        .build()
}

/// Fixed set of binary input/target pairs
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSet {
    pub inputs: Vec<Vec<f32>>,
    pub targets: Vec<Vec<f32>>,
}

impl PatternSet {
    /// `n_patterns` random binary patterns over `n_units`, each with exactly
    /// `n_on` active units at permuted positions. Targets are the inputs.
    pub fn random(n_units: usize, n_patterns: usize, n_on: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_on = n_on.min(n_units);
        let mut idx: Vec<usize> = (0..n_units).collect();
        let inputs: Vec<Vec<f32>> = (0..n_patterns)
            .map(|_| {
                idx.shuffle(&mut rng);
                let mut p = vec![0.0; n_units];
                for &i in &idx[..n_on] {
                    p[i] = 1.0;
                }
                p
            })
            .collect();
        Self {
            targets: inputs.clone(),
            inputs,
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Per-epoch summary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    /// Mean target-layer CorSim over the epoch's trials
    pub cor_sim: f32,
    pub trials: usize,
    /// Spikes over all neurons and lanes
    pub spikes: u64,
}

/// Drives one input layer and one target layer through shuffled epochs
pub struct Trainer {
    input: String,
    target: String,
    rng: StdRng,
    epoch: usize,
    pub stats: EngineStats,
}

impl Trainer {
    pub fn new(input: &str, target: &str, seed: u64) -> Self {
        Self {
            input: input.to_string(),
            target: target.to_string(),
            rng: StdRng::seed_from_u64(seed),
            epoch: 0,
            stats: EngineStats::default(),
        }
    }

    /// Presents every pattern once in a fresh random order.
    ///
    /// Patterns fill the data lanes `n_data` at a time; a short final batch
    /// leaves the remaining lanes at their previous input.
    pub fn run_epoch(
        &mut self,
        net: &mut Network,
        patterns: &PatternSet,
        learn: bool,
    ) -> Result<EpochStats> {
        if patterns.is_empty() {
            return Err(NetError::InvalidParameter("empty pattern set".to_string()));
        }
        let mut order: Vec<usize> = (0..patterns.len()).collect();
        order.shuffle(&mut self.rng);

        let theta = net.ctx.theta_cycles as u64;
        let mut cor_sum = 0.0;
        let mut trials = 0;
        let mut spikes = 0;
        for batch in order.chunks(net.n_data()) {
            for (di, &pi) in batch.iter().enumerate() {
                net.apply_ext(&self.input, di, &ExtPattern::flat(patterns.inputs[pi].clone()))?;
                net.apply_ext(&self.target, di, &ExtPattern::flat(patterns.targets[pi].clone()))?;
            }
            let trial = run_trial(net, learn)?;
            cor_sum += trial.mean_cor_sim();
            trials += 1;
            spikes += trial.spikes;
            self.stats.record(&trial, theta);
        }

        self.epoch += 1;
        let stats = EpochStats {
            epoch: self.epoch,
            cor_sim: cor_sum / trials as f32,
            trials,
            spikes,
        };
        info!(
            "[NETWORK] epoch {} CorSim {:.3} ({} trials, {} spikes, {:.1} us/cycle)",
            stats.epoch,
            stats.cor_sim,
            trials,
            spikes,
            self.stats.avg_cycle_time_us()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_patterns_have_exact_activity() {
        let set = PatternSet::random(25, 10, 6, 3);
        assert_eq!(set.len(), 10);
        for p in &set.inputs {
            assert_eq!(p.len(), 25);
            assert_eq!(p.iter().filter(|&&v| v == 1.0).count(), 6);
        }
        assert_eq!(set.inputs, set.targets);
        assert_eq!(set, PatternSet::random(25, 10, 6, 3));
        assert_ne!(set, PatternSet::random(25, 10, 6, 4));
    }

    #[test]
    fn test_configure_applies_context() {
        let mut config = SpikenetConfig::default();
        config.engine.backend = "cpu".to_string();
        config.engine.workers = 2;
        config.context.theta_cycles = 80;
        config.context.plus_cycles = 20;
        config.context.n_data = 3;
        let net = configure(NetworkBuilder::new("cfg"), &config)
            .unwrap()
            .layer("In", &[2], LayerKind::Input)
            .layer("Out", &[2], LayerKind::Target)
            .connect("In", "Out", Pattern::default())
            .build()
            .unwrap();
        assert_eq!(net.n_data(), 3);
        assert_eq!(net.ctx.theta_cycles, 80);
        assert_eq!(net.plus_cycles, 20);
    }

    #[test]
    fn test_configure_rejects_unknown_names() {
        let mut config = SpikenetConfig::default();
        config.engine.backend = "gpu".to_string();
        assert!(matches!(
            configure(NetworkBuilder::new("x"), &config),
            Err(NetError::InvalidBackend(_))
        ));

        let mut config = SpikenetConfig::default();
        config.context.syn_ca_mode = "sometimes".to_string();
        assert!(matches!(
            configure(NetworkBuilder::new("x"), &config),
            Err(NetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_association_net_layout() {
        let net = association_net(NetworkBuilder::new("assoc").seed(2), &[3, 3]).unwrap();
        assert_eq!(net.n_neurons(), 18);
        assert_eq!(net.n_synapses(), 81);
        let out = net.layer("Output").unwrap();
        assert!(out.is_target());
        assert_eq!(out.params.inhib.layer.gi, ASSOC_TARGET_GI);
        assert_eq!(net.layer("Input").unwrap().params.act.clamp.ge, 1.5);
    }

    #[test]
    fn test_n_on_is_capped() {
        let set = PatternSet::random(4, 2, 10, 0);
        assert!(set.inputs.iter().all(|p| p.iter().all(|&v| v == 1.0)));
    }
}
