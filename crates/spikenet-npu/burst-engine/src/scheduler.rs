// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Cycle Scheduler
//!
//! Runs the five phases of one cycle in order on a [`ComputeBackend`] and
//! times each of them. Every phase returns only after all its rows
//! completed, so phase boundaries are the barriers.
//!
//! Set `SPIKENET_TRACE_PHASES=1` to emit per-phase timings at trace level.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use spikenet_npu_neural::{Context, NetError, Result};
use spikenet_npu_runtime::{ComputeBackend, NeuronArray, PoolArray, SynapseArray};
use tracing::{trace, warn};

use crate::phases::{calcium, gather, inhibition, membrane, pools, Topology};

/// Cycles slower than this are reported
const SLOW_CYCLE: Duration = Duration::from_millis(50);

fn trace_phases() -> bool {
    static TRACE: OnceLock<bool> = OnceLock::new();
    *TRACE.get_or_init(|| {
        std::env::var("SPIKENET_TRACE_PHASES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

/// Wall time spent in each phase of the last cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleProfile {
    pub gather: Duration,
    pub pools: Duration,
    pub inhibition: Duration,
    pub membrane: Duration,
    pub calcium: Duration,
    pub total: Duration,
}

/// Mutable network state borrowed for one cycle
pub struct CycleState<'a> {
    pub ctx: &'a mut Context,
    pub topo: Topology<'a>,
    pub nrns: &'a mut NeuronArray,
    pub syns: &'a mut SynapseArray,
    pub pools: &'a mut PoolArray,
}

#[derive(Debug, Clone)]
pub struct CycleScheduler {
    slow_cycle: Duration,
    last: CycleProfile,
    cycles: u64,
}

impl Default for CycleScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleScheduler {
    pub fn new() -> Self {
        Self {
            slow_cycle: SLOW_CYCLE,
            last: CycleProfile::default(),
            cycles: 0,
        }
    }

    /// Overrides the slow-cycle warning threshold
    pub fn with_slow_cycle(mut self, threshold: Duration) -> Self {
        self.slow_cycle = threshold;
        self
    }

    /// Profile of the most recent cycle
    pub fn last_profile(&self) -> CycleProfile {
        self.last
    }

    /// Cycles run by this scheduler
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs one cycle and advances the context clock.
    ///
    /// Fails with [`NetError::ComputationError`] when a membrane potential
    /// stops being finite; the clock is not advanced in that case.
    pub fn run_cycle(
        &mut self,
        st: CycleState<'_>,
        backend: &dyn ComputeBackend,
    ) -> Result<CycleProfile> {
        let CycleState {
            ctx,
            topo,
            nrns,
            syns,
            pools: pls,
        } = st;
        let start = Instant::now();
        let mut prof = CycleProfile::default();

        let t = Instant::now();
        gather::scatter(ctx, topo, nrns, syns, backend);
        gather::gather(ctx, topo, nrns, backend);
        prof.gather = t.elapsed();

        let t = Instant::now();
        pools::pool_reduce(ctx, topo, nrns, pls, backend);
        prof.pools = t.elapsed();

        let t = Instant::now();
        inhibition::inhibition(topo, pls, backend);
        prof.inhibition = t.elapsed();

        let t = Instant::now();
        let finite = membrane::membrane(ctx, topo, nrns, pls, backend);
        prof.membrane = t.elapsed();
        if !finite {
            warn!(
                "[CYCLE] Non-finite membrane potential at cycle {} (trial {})",
                ctx.cycles_total, ctx.trial
            );
            return Err(NetError::ComputationError(format!(
                "non-finite membrane potential at cycle {}",
                ctx.cycles_total
            )));
        }

        let t = Instant::now();
        calcium::neuron_ca(topo, nrns, backend);
        calcium::synapse_ca(ctx, topo, nrns, syns, backend);
        prof.calcium = t.elapsed();

        ctx.cycle_inc();
        prof.total = start.elapsed();
        self.last = prof;
        self.cycles += 1;

        if trace_phases() {
            trace!(
                cycle = ctx.cycles_total,
                gather_us = prof.gather.as_micros() as u64,
                pools_us = prof.pools.as_micros() as u64,
                inhib_us = prof.inhibition.as_micros() as u64,
                membrane_us = prof.membrane.as_micros() as u64,
                calcium_us = prof.calcium.as_micros() as u64,
                "[CYCLE] phase timings"
            );
        }
        if prof.total > self.slow_cycle {
            warn!(
                "[CYCLE] Slow cycle {}: {:.2}ms on {}",
                ctx.cycles_total,
                prof.total.as_secs_f64() * 1000.0,
                backend.backend_name()
            );
        }
        Ok(prof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_runtime::SerialBackend;

    #[test]
    fn test_empty_network_advances_clock() {
        let mut ctx = Context::new(2);
        let mut nrns = NeuronArray::new(2);
        let mut syns = SynapseArray::new(2);
        let mut pools = PoolArray::new(2);
        let mut sched = CycleScheduler::new();
        for _ in 0..3 {
            let st = CycleState {
                ctx: &mut ctx,
                topo: Topology {
                    layers: &[],
                    conns: &[],
                },
                nrns: &mut nrns,
                syns: &mut syns,
                pools: &mut pools,
            };
            sched.run_cycle(st, &SerialBackend::new()).unwrap();
        }
        assert_eq!(ctx.cycle, 3);
        assert_eq!(ctx.cycles_total, 3);
        assert_eq!(sched.cycles(), 3);
        let prof = sched.last_profile();
        assert!(prof.total >= prof.membrane);
    }
}
