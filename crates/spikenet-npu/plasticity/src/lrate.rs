// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network-wide learning-rate and zero-sum controls

use spikenet_npu_runtime::{Connection, Layer};
use tracing::debug;

/// Sets the dynamic modulation multiplier on every connection
pub fn set_lrate_mod(conns: &mut [Connection], modulation: f32) {
    for c in conns.iter_mut() {
        c.params.learn.lrate.modulation = modulation;
        c.params.learn.lrate.update();
    }
    debug!(modulation, "lrate modulation set");
}

/// Sets the schedule multiplier on every connection
pub fn set_lrate_sched(conns: &mut [Connection], sched: f32) {
    for c in conns.iter_mut() {
        c.params.learn.lrate.sched = sched;
        c.params.learn.lrate.update();
    }
    debug!(sched, "lrate schedule set");
}

/// Sets the TrgAvg zero-sum proportion on every layer and the DWt zero-sum
/// proportion on every connection
pub fn set_sub_mean(layers: &mut [Layer], conns: &mut [Connection], trg_avg: f32, conn: f32) {
    for l in layers.iter_mut() {
        l.params.learn.trg_avg_act.sub_mean = trg_avg;
    }
    for c in conns.iter_mut() {
        c.params.learn.trace.sub_mean = conn;
    }
}
