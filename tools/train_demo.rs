// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pattern-association training run.
//!
//! Builds an input -> target network from `spikenet.toml` (or defaults),
//! trains it on random binary patterns and optionally writes the weights.
//!
//! Debug flags (`--debug-all`, `--debug-<crate>`, `SPIKENET_DEBUG`) are
//! accepted alongside the options below.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use spikenet::config::{
    apply_cli_overrides, apply_environment_overrides, load_config, validate_config, ConfigError,
    SpikenetConfig,
};
use spikenet::observability::{debug_flags_help, init_logging, parse_debug_flags};
use spikenet::prelude::*;
use spikenet::train::{association_net, configure};

/// spikenet pattern-association trainer
#[derive(Parser, Debug)]
#[command(name = "spikenet-train", version, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to the configuration file (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Edge length of the square input and target layers
    #[arg(long, default_value_t = 5)]
    side: usize,

    /// Active units per pattern (default: a quarter of the layer)
    #[arg(long)]
    active: Option<usize>,

    /// Training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Patterns presented per epoch
    #[arg(long)]
    trials_per_epoch: Option<usize>,

    /// Random seed for weights, patterns and presentation order
    #[arg(long)]
    seed: Option<u64>,

    /// Compute backend: cpu, kernel or auto
    #[arg(long)]
    backend: Option<String>,

    /// Write the trained weights here
    #[arg(long)]
    weights_out: Option<PathBuf>,

    /// Load starting weights from this file
    #[arg(long)]
    weights_in: Option<PathBuf>,
}

impl Args {
    /// Explicit options as config overrides
    fn overrides(&self) -> HashMap<String, String> {
        let mut cli = HashMap::new();
        if let Some(v) = self.epochs {
            cli.insert("run.epochs".to_string(), v.to_string());
        }
        if let Some(v) = self.trials_per_epoch {
            cli.insert("run.trials_per_epoch".to_string(), v.to_string());
        }
        if let Some(v) = self.seed {
            cli.insert("run.seed".to_string(), v.to_string());
        }
        if let Some(v) = &self.backend {
            cli.insert("engine.backend".to_string(), v.clone());
        }
        if let Some(v) = &self.weights_out {
            cli.insert("run.weights_out".to_string(), v.display().to_string());
        }
        cli
    }
}

fn load(args: &Args) -> Result<SpikenetConfig> {
    let cli = args.overrides();
    match load_config(args.config.as_deref(), Some(&cli)) {
        Ok(config) => Ok(config),
        // no file anywhere: defaults plus overrides
        Err(ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = SpikenetConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, &cli)?;
            Ok(config)
        }
        Err(e) => Err(e).context("Failed to load configuration"),
    }
}

fn main() -> Result<()> {
    let (debug_flags, rest) = parse_debug_flags();
    let args = Args::parse_from(rest);

    let config = load(&args)?;
    validate_config(&config)?;
    init_logging(&config.logging, &debug_flags)?;

    let side = args.side.max(1);
    let n_units = side * side;
    let n_on = args.active.unwrap_or((n_units / 4).max(1));

    let builder = configure(NetworkBuilder::new("train"), &config)?;
    let mut net = association_net(builder, &[side, side])?;
    net.set_slow_cycle_threshold(Duration::from_millis(config.engine.slow_cycle_warn_ms));

    if let Some(path) = &args.weights_in {
        net.load_weights(path)
            .with_context(|| format!("Failed to load weights from {}", path.display()))?;
        info!("[NETWORK] loaded weights from {}", path.display());
    }

    let patterns = PatternSet::random(
        n_units,
        config.run.trials_per_epoch,
        n_on,
        config.run.seed,
    );
    info!(
        "[NETWORK] training {} patterns ({} of {} active) for {} epochs on {}",
        patterns.len(),
        n_on,
        n_units,
        config.run.epochs,
        net.backend_name()
    );

    let mut trainer = Trainer::new("Input", "Output", config.run.seed.wrapping_add(1));
    let mut last = Vec::new();
    for _ in 0..config.run.epochs {
        let epoch = trainer.run_epoch(&mut net, &patterns, true)?;
        last.push(epoch.cor_sim);
        if last.len() > 10 {
            last.remove(0);
        }
    }

    let tail = if last.is_empty() {
        0.0
    } else {
        last.iter().sum::<f32>() / last.len() as f32
    };
    if tail < 0.9 {
        warn!("[NETWORK] final CorSim {:.3} below 0.9", tail);
    }
    info!(
        "[NETWORK] done: {} trials, {} cycles, {:.1} us/trial, CorSim (last {} epochs) {:.3}",
        trainer.stats.total_trials,
        trainer.stats.total_cycles,
        trainer.stats.avg_trial_time_us(),
        last.len(),
        tail
    );

    if let Some(path) = &config.run.weights_out {
        net.save_weights(path)
            .with_context(|| format!("Failed to write weights to {}", path.display()))?;
        info!("[NETWORK] wrote weights to {}", path.display());
    }
    Ok(())
}
