// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phase 2: pool reduction
//!
//! Each (pool, lane) row sums its neurons sequentially, so the aggregates
//! are independent of how rows are dispatched.

use spikenet_npu_neural::{Context, NeuronVar, PoolVar, VarRow};
use spikenet_npu_runtime::{flags, ComputeBackend, NeuronArray, PoolArray};

use super::Topology;

/// Recomputes FFs, FBs, GeExts, the activity statistics and the Clamped
/// flag of every pool from its neurons. Neurons flagged OFF are skipped.
pub fn pool_reduce(
    ctx: &Context,
    topo: Topology<'_>,
    nrns: &NeuronArray,
    pools: &mut PoolArray,
    backend: &dyn ComputeBackend,
) {
    let plus = ctx.is_plus_phase();
    let PoolArray {
        vals,
        st,
        ed,
        layer,
        n_data,
        ..
    } = pools;
    let (st, ed, layer): (&[u32], &[u32], &[u32]) = (st, ed, layer);
    let n_data = *n_data;

    backend.for_each_row(vals, PoolVar::COUNT, &|r, pl| {
        let (pi, di) = (r / n_data, r % n_data);
        let mut ff = 0.0f32;
        let mut fb = 0.0f32;
        let mut ge_ext = 0.0f32;
        let mut act_sum = 0.0f32;
        let mut act_max = 0.0f32;
        let mut ca_sum = 0.0f32;
        let mut ca_max = 0.0f32;
        let mut n = 0usize;
        for ni in st[pi] as usize..ed[pi] as usize {
            if nrns.has_flag(ni, di, flags::OFF) {
                continue;
            }
            let nrn = nrns.row(ni, di);
            ff += nrn.var(NeuronVar::GeRaw);
            fb += nrn.var(NeuronVar::Spike);
            ge_ext += nrn.var(NeuronVar::GeExt);
            let act = nrn.var(NeuronVar::Act);
            act_sum += act;
            act_max = act_max.max(act);
            let ca = nrn.var(NeuronVar::CaSpkP);
            ca_sum += ca;
            ca_max = ca_max.max(ca);
            n += 1;
        }
        pl.set_var(PoolVar::FFs, PoolArray::avg(ff, n));
        pl.set_var(PoolVar::FBs, PoolArray::avg(fb, n));
        pl.set_var(PoolVar::GeExts, PoolArray::avg(ge_ext, n));
        pl.set_var(PoolVar::ActAvg, PoolArray::avg(act_sum, n));
        pl.set_var(PoolVar::ActMax, act_max);
        pl.set_var(PoolVar::CaSpkPAvg, PoolArray::avg(ca_sum, n));
        pl.set_var(PoolVar::CaSpkPMax, ca_max);
        let clamped = topo.layers[layer[pi] as usize].is_clamped(plus);
        pl.set_var(PoolVar::Clamped, if clamped { 1.0 } else { 0.0 });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_runtime::{Layer, LayerKind, LayerParams, LayerShape, LayerVals};

    #[test]
    fn test_reduce_skips_off_neurons() {
        let layers = vec![Layer {
            name: "In".to_string(),
            index: 0,
            kind: LayerKind::Input,
            shape: LayerShape::new("In", &[4]).unwrap(),
            neur_st: 0,
            n_neurons: 4,
            pool_st: 0,
            n_pools: 1,
            params: LayerParams::default(),
            vals: vec![LayerVals::new(0.1)],
            lay_inhib: Vec::new(),
            recv_conns: Vec::new(),
            send_conns: Vec::new(),
        }];
        let topo = Topology {
            layers: &layers,
            conns: &[],
        };
        let mut nrns = NeuronArray::new(1);
        nrns.extend(4, 0);
        let mut pools = PoolArray::new(1);
        pools.push(0, 4, 0, true);

        for ni in 0..4 {
            nrns.set(ni, 0, NeuronVar::GeRaw, 0.2 * (ni + 1) as f32);
            nrns.set(ni, 0, NeuronVar::Act, 0.1 * ni as f32);
        }
        nrns.set(0, 0, NeuronVar::Spike, 1.0);
        nrns.set(3, 0, NeuronVar::Act, 5.0);
        nrns.set_flag(3, 0, flags::OFF);

        pool_reduce(&Context::new(1), topo, &nrns, &mut pools, &spikenet_npu_runtime::SerialBackend::new());
        // (0.2 + 0.4 + 0.6) / 3
        assert!((pools.get(0, 0, PoolVar::FFs) - 0.4).abs() < 1e-6);
        assert!((pools.get(0, 0, PoolVar::FBs) - 1.0 / 3.0).abs() < 1e-6);
        assert!((pools.get(0, 0, PoolVar::ActMax) - 0.2).abs() < 1e-6);
        assert_eq!(pools.get(0, 0, PoolVar::Clamped), 1.0);
    }
}
