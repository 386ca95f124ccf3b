// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Trial Loop
//!
//! One theta window: minus cycles, phase bookkeeping, plus cycles, and the
//! end-of-trial learning passes.
//!
//! ```text
//! new_state
//! cycles 0 .. theta-plus            (SpkSt1 at theta/4, SpkSt2 at theta/2)
//! minus_phase, plus_phase_start
//! cycles theta-plus .. theta
//! plus_phase
//! [learn] dwt, wt_from_dwt, slow_adapt every slow_interval trials
//! ```

use std::time::{Duration, Instant};

use spikenet_npu_neural::Result;
use tracing::debug;

use crate::network::Network;

/// Summary of one completed trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialStats {
    pub trial: u64,
    /// `(layer, CorSim)` for every target layer, averaged over lanes
    pub cor_sim: Vec<(String, f32)>,
    /// Spikes over all neurons and lanes
    pub spikes: u64,
    /// SlowAdapt ran at the end of this trial
    pub slow: bool,
    pub elapsed: Duration,
}

impl TrialStats {
    /// Mean CorSim over target layers (1.0 when there are none)
    pub fn mean_cor_sim(&self) -> f32 {
        if self.cor_sim.is_empty() {
            return 1.0;
        }
        self.cor_sim.iter().map(|(_, c)| c).sum::<f32>() / self.cor_sim.len() as f32
    }
}

/// Runs one trial on whatever input is currently applied.
///
/// With `learn` false the trial runs in testing mode: no weight changes
/// and no homeostatic averaging.
pub fn run_trial(net: &mut Network, learn: bool) -> Result<TrialStats> {
    let start = Instant::now();
    let theta = net.ctx.theta_cycles;
    let minus = theta - net.plus_cycles;
    let (st1, st2) = (theta / 4, theta / 2);

    net.new_state(!learn);
    let mut spikes = 0;
    for cyc in 0..minus {
        net.cycle()?;
        spikes += net.spike_count();
        if cyc + 1 == st1 {
            net.spk_st1();
        }
        if cyc + 1 == st2 {
            net.spk_st2();
        }
    }
    net.minus_phase();
    net.plus_phase_start();
    for _ in 0..net.plus_cycles {
        net.cycle()?;
        spikes += net.spike_count();
    }
    net.plus_phase();

    let mut slow = false;
    if learn {
        net.dwt();
        net.wt_from_dwt();
        if net.ctx.slow_inc() {
            net.slow_adapt();
            slow = true;
        }
    }

    let n_data = net.n_data() as f32;
    let cor_sim = net
        .layers
        .iter()
        .filter(|l| l.is_target())
        .map(|l| {
            let c = l.vals.iter().map(|v| v.cor_sim.cor).sum::<f32>() / n_data;
            (l.name.clone(), c)
        })
        .collect();

    let stats = TrialStats {
        trial: net.ctx.trial,
        cor_sim,
        spikes,
        slow,
        elapsed: start.elapsed(),
    };
    debug!(
        trial = stats.trial,
        cor_sim = stats.mean_cor_sim(),
        spikes,
        slow,
        elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
        "[NETWORK] trial done"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetworkBuilder;
    use crate::input::ExtPattern;
    use spikenet_npu_neural::{NeuronVar, SynapseVar};
    use spikenet_npu_runtime::{LayerKind, Pattern};

    fn net() -> Network {
        NetworkBuilder::new("trial")
            .seed(9)
            .theta_cycles(40)
            .plus_cycles(10)
            .slow_interval(2)
            .layer("In", &[4], LayerKind::Input)
            .layer("Out", &[4], LayerKind::Target)
            .connect("In", "Out", Pattern::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_trial_advances_clock() {
        let mut n = net();
        n.apply_ext("In", 0, &ExtPattern::flat(vec![1.0, 0.0, 1.0, 0.0]))
            .unwrap();
        n.apply_ext("Out", 0, &ExtPattern::flat(vec![0.0, 1.0, 0.0, 1.0]))
            .unwrap();
        let s = run_trial(&mut n, true).unwrap();
        assert_eq!(n.ctx.cycle, 40);
        assert_eq!(s.cor_sim.len(), 1);
        assert_eq!(s.cor_sim[0].0, "Out");
        assert!(!s.slow);
        assert!(run_trial(&mut n, true).unwrap().slow);
        assert_eq!(n.ctx.cycles_total, 80);
    }

    #[test]
    fn test_testing_trial_leaves_weights() {
        let mut n = net();
        n.apply_ext("In", 0, &ExtPattern::flat(vec![1.0; 4])).unwrap();
        n.apply_ext("Out", 0, &ExtPattern::flat(vec![1.0; 4])).unwrap();
        let before = n.conn_weights(0, SynapseVar::Wt);
        let s = run_trial(&mut n, false).unwrap();
        assert!(s.spikes > 0);
        assert_eq!(before, n.conn_weights(0, SynapseVar::Wt));
        assert!(n.neurons.get(0, 0, NeuronVar::ActM) > 0.0);
    }
}
