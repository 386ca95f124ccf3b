// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Learning passes over the whole network

use spikenet_npu_plasticity as plasticity;
use tracing::debug;

use super::Network;

impl Network {
    /// Accumulates DWt on every learning connection, then applies the
    /// per-receiver zero-sum subtraction
    pub fn dwt(&mut self) {
        let backend = self.backend.as_ref();
        for conn in &self.conns {
            plasticity::dwt(&self.ctx, conn, &mut self.synapses, &self.neurons, backend);
        }
        for conn in &self.conns {
            plasticity::dwt_sub_mean(conn, &self.layers[conn.recv], &mut self.synapses, backend);
        }
    }

    /// Folds DTrgAvg into TrgAvg, then DWt into the weights
    pub fn wt_from_dwt(&mut self) {
        let backend = self.backend.as_ref();
        for lay in &self.layers {
            plasticity::trg_avg_from_d(lay, &mut self.neurons, backend);
        }
        for conn in &self.conns {
            plasticity::wt_from_dwt(conn, &mut self.synapses, backend);
        }
    }

    /// Slow pass: adaptive inhibition, AvgDif, SWt adaptation and synaptic
    /// scaling
    pub fn slow_adapt(&mut self) {
        let backend = self.backend.as_ref();
        for lay in self.layers.iter_mut() {
            plasticity::adapt_inhib(lay);
        }
        for lay in &self.layers {
            plasticity::avg_dif_from_trg_avg(lay, &mut self.neurons, backend);
        }
        for conn in &self.conns {
            plasticity::slow_adapt(
                conn,
                &self.layers[conn.recv],
                &mut self.synapses,
                &self.neurons,
                backend,
            );
        }
        debug!(trial = self.ctx.trial, "[NETWORK] slow adapt");
    }

    /// Restores last trial's failed synapses and draws this trial's failures
    pub fn syn_fail(&mut self) {
        let backend = self.backend.as_ref();
        for conn in &self.conns {
            plasticity::syn_fail(&self.ctx, conn, &mut self.synapses, self.seed, backend);
        }
    }

    /// Dynamic learning-rate multiplier on every connection
    pub fn set_lrate_mod(&mut self, modulation: f32) {
        plasticity::set_lrate_mod(&mut self.conns, modulation);
    }

    /// Scheduled learning-rate multiplier on every connection
    pub fn set_lrate_sched(&mut self, sched: f32) {
        plasticity::set_lrate_sched(&mut self.conns, sched);
    }

    /// Zero-sum proportions for TrgAvg (layers) and DWt (connections)
    pub fn set_sub_mean(&mut self, trg_avg: f32, conn: f32) {
        plasticity::set_sub_mean(&mut self.layers, &mut self.conns, trg_avg, conn);
    }
}
