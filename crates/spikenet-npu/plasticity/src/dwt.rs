// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weight change from synaptic calcium

use spikenet_npu_neural::{Context, NeuronVar, SynCaVar, SynapseVar, VarRow};
use spikenet_npu_runtime::{ComputeBackend, Connection, Layer, NeuronArray, SynapseArray};

use crate::conn_rows;

/// Accumulates DWt for every synapse of `conn`.
///
/// Each synapse sums `lrate.eff * RLRate * (CaP - CaD)` over data lanes,
/// with its calcium caught up to the current counter. The stored calcium
/// rows are left untouched.
pub fn dwt(
    ctx: &Context,
    conn: &Connection,
    syns: &mut SynapseArray,
    nrns: &NeuronArray,
    backend: &dyn ComputeBackend,
) {
    let learn = &conn.params.learn;
    if !learn.learn {
        return;
    }
    let n_data = ctx.n_data as usize;
    let ctr = ctx.syn_ca_ctr;
    let syn_st = conn.syn_st;

    let SynapseArray {
        vals,
        ca,
        recv,
        n_data: arr_data,
        ..
    } = syns;
    let ca: &[f32] = ca;
    let recv: &[u32] = recv;
    let arr_data = *arr_data;
    let rows = conn_rows(vals, conn);

    backend.for_each_row(rows, SynapseVar::COUNT, &|k, row| {
        let si = syn_st + k;
        let ri = recv[si] as usize;
        let mut acc = 0.0f32;
        for di in 0..n_data {
            let st = (si * arr_data + di) * SynCaVar::COUNT;
            let syn_ca = &ca[st..st + SynCaVar::COUNT];
            let (_, cap, cad) = learn.kinase_ca.current_ca(syn_ca, ctr);
            let rlrate = nrns.get(ri, di, NeuronVar::RlRate);
            acc += learn.dwt(cap, cad, rlrate);
        }
        row.add_var(SynapseVar::DWt, acc);
    });
}

/// Subtracts `trace.sub_mean` times the mean nonzero DWt from every nonzero
/// DWt of each receiving neuron that has more than one nonzero DWt.
pub fn dwt_sub_mean(
    conn: &Connection,
    recv_lay: &Layer,
    syns: &mut SynapseArray,
    backend: &dyn ComputeBackend,
) {
    let learn = &conn.params.learn;
    let sm = learn.trace.sub_mean;
    if !learn.learn || sm == 0.0 {
        return;
    }

    let mut means = vec![0.0f32; conn.recv_con.len()];
    {
        let vals: &[f32] = &syns.vals;
        backend.for_each_row(&mut means, 1, &|ri, m| {
            let mut sum = 0.0f32;
            let mut nnz = 0usize;
            for k in conn.recv_con[ri].range() {
                let si = conn.recv_syn_idx[k] as usize;
                let dw = vals[si * SynapseVar::COUNT + SynapseVar::DWt.index()];
                if dw != 0.0 {
                    sum += dw;
                    nnz += 1;
                }
            }
            m[0] = if nnz > 1 { sm * sum / nnz as f32 } else { 0.0 };
        });
    }

    let recv_st = recv_lay.neur_st;
    let syn_st = conn.syn_st;
    let SynapseArray { vals, recv, .. } = syns;
    let recv: &[u32] = recv;
    let means = &means;
    backend.for_each_row(conn_rows(vals, conn), SynapseVar::COUNT, &|k, row| {
        let dw = row.var(SynapseVar::DWt);
        if dw != 0.0 {
            let ri = recv[syn_st + k] as usize - recv_st;
            row.set_var(SynapseVar::DWt, dw - means[ri]);
        }
    });
}
