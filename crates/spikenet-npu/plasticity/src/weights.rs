// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weight-triple updates: per-trial LWt learning and slow structural passes

use spikenet_npu_neural::{ConnectionKind, NeuronAvgVar, SynapseVar, VarRow};
use spikenet_npu_runtime::{flags, ComputeBackend, Connection, Layer, NeuronArray, SynapseArray};
use tracing::trace;

use crate::conn_rows;

/// Applies accumulated DWt to LWt and Wt (restoring failed synapses)
pub fn wt_from_dwt(conn: &Connection, syns: &mut SynapseArray, backend: &dyn ComputeBackend) {
    if !conn.params.learn.learn {
        return;
    }
    let swt = &conn.params.swt;
    backend.for_each_row(conn_rows(&mut syns.vals, conn), SynapseVar::COUNT, &|_, row| {
        swt.wt_from_dwt(row);
    });
}

/// Structural SWt update from soft-bounded, per-receiver mean-subtracted DSWt
pub fn swt_from_wt(
    conn: &Connection,
    recv_lay: &Layer,
    syns: &mut SynapseArray,
    backend: &dyn ComputeBackend,
) {
    let swt = &conn.params.swt;
    if !conn.params.learn.learn || !swt.adapt.on || recv_lay.is_target() {
        return;
    }

    backend.for_each_row(conn_rows(&mut syns.vals, conn), SynapseVar::COUNT, &|_, row| {
        swt.soft_bound_dswt(row);
    });

    let sub_mean = swt.adapt.sub_mean;
    let mut means = vec![0.0f32; conn.recv_con.len()];
    {
        let vals: &[f32] = &syns.vals;
        backend.for_each_row(&mut means, 1, &|ri, m| {
            let run = conn.recv_con[ri];
            if run.n == 0 {
                return;
            }
            let mut sum = 0.0f32;
            for k in run.range() {
                let si = conn.recv_syn_idx[k] as usize;
                sum += vals[si * SynapseVar::COUNT + SynapseVar::DSWt.index()];
            }
            m[0] = sub_mean * sum / run.n as f32;
        });
    }

    let recv_st = recv_lay.neur_st;
    let syn_st = conn.syn_st;
    let SynapseArray { vals, recv, .. } = syns;
    let recv: &[u32] = recv;
    let means = &means;
    backend.for_each_row(conn_rows(vals, conn), SynapseVar::COUNT, &|k, row| {
        let ri = recv[syn_st + k] as usize - recv_st;
        swt.swt_from_dswt(row, means[ri]);
    });
}

/// Nudges LWt toward each receiver's target activity share, soft-bounded
/// within [0, 1]. Needs AvgDif from `avg_dif_from_trg_avg`. Receivers that
/// are off in every lane keep their weights.
pub fn syn_scale(
    conn: &Connection,
    recv_lay: &Layer,
    syns: &mut SynapseArray,
    nrns: &NeuronArray,
    backend: &dyn ComputeBackend,
) {
    if !conn.params.learn.learn
        || conn.kind() == ConnectionKind::Inhibitory
        || !recv_lay.learns_trg_avg()
    {
        return;
    }
    let lr = recv_lay.params.learn.trg_avg_act.syn_scale_rate;
    let swt = &conn.params.swt;
    let syn_st = conn.syn_st;
    let SynapseArray { vals, recv, .. } = syns;
    let recv: &[u32] = recv;
    backend.for_each_row(conn_rows(vals, conn), SynapseVar::COUNT, &|k, row| {
        let ri = recv[syn_st + k] as usize;
        if (0..nrns.n_data).all(|di| nrns.has_flag(ri, di, flags::OFF)) {
            return;
        }
        let adif = -lr * nrns.get_avg(ri, NeuronAvgVar::AvgDif);
        let lwt = row.var(SynapseVar::LWt);
        let s = row.var(SynapseVar::SWt);
        let lwt = if adif >= 0.0 {
            lwt + (1.0 - lwt) * adif * s
        } else {
            lwt + lwt * adif * s
        };
        row.set_var(SynapseVar::LWt, lwt);
        row.set_var(SynapseVar::Wt, swt.wt_val(s, lwt));
    });
}

/// Connection half of the slow pass: SWt adaptation then synaptic scaling
pub fn slow_adapt(
    conn: &Connection,
    recv_lay: &Layer,
    syns: &mut SynapseArray,
    nrns: &NeuronArray,
    backend: &dyn ComputeBackend,
) {
    trace!(connection = %conn.name, "slow adapt");
    swt_from_wt(conn, recv_lay, syns, backend);
    syn_scale(conn, recv_lay, syns, nrns, backend);
}
