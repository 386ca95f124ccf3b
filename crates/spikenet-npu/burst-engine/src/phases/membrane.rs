// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phase 4: membrane update

use std::sync::atomic::{AtomicBool, Ordering};

use spikenet_npu_neural::{Context, NeuronVar, PoolVar, VarRow};
use spikenet_npu_runtime::{flags, ComputeBackend, NeuronArray, PoolArray};

use super::Topology;

/// Runs `cycle_neuron` on every active (neuron, lane).
///
/// Each neuron reads the final Gi of its innermost pool. Returns false when
/// any updated Vm is not finite.
pub fn membrane(
    ctx: &Context,
    topo: Topology<'_>,
    nrns: &mut NeuronArray,
    pools: &PoolArray,
    backend: &dyn ComputeBackend,
) -> bool {
    let plus = ctx.is_plus_phase();
    let NeuronArray {
        vals,
        flags: nrn_flags,
        layer,
        sub_pool,
        n_data,
        ..
    } = nrns;
    let (nrn_flags, layer, sub_pool): (&[u8], &[u32], &[u32]) = (nrn_flags, layer, sub_pool);
    let n_data = *n_data;
    let diverged = AtomicBool::new(false);

    backend.for_each_row(vals, NeuronVar::COUNT, &|r, nrn| {
        let f = nrn_flags[r];
        if f & flags::OFF != 0 {
            return;
        }
        let (ni, di) = (r / n_data, r % n_data);
        let lay = &topo.layers[layer[ni] as usize];
        let pool_gi = pools.get(sub_pool[ni] as usize, di, PoolVar::Gi);
        let clamped = lay.is_clamped(plus) && f & flags::HAS_EXT != 0;
        lay.params.act.cycle_neuron(nrn, pool_gi, clamped);
        if !nrn.var(NeuronVar::Vm).is_finite() {
            diverged.store(true, Ordering::Relaxed);
        }
    });
    !diverged.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_runtime::{Layer, LayerKind, LayerParams, LayerShape, LayerVals, SerialBackend};

    fn input_layer() -> Vec<Layer> {
        let mut params = LayerParams::default();
        params.update();
        vec![Layer {
            name: "In".to_string(),
            index: 0,
            kind: LayerKind::Input,
            shape: LayerShape::new("In", &[2]).unwrap(),
            neur_st: 0,
            n_neurons: 2,
            pool_st: 0,
            n_pools: 1,
            params,
            vals: vec![LayerVals::new(0.1)],
            lay_inhib: Vec::new(),
            recv_conns: Vec::new(),
            send_conns: Vec::new(),
        }]
    }

    #[test]
    fn test_clamped_neuron_spikes_and_off_is_frozen() {
        let layers = input_layer();
        let topo = Topology {
            layers: &layers,
            conns: &[],
        };
        let mut nrns = NeuronArray::new(1);
        nrns.extend(2, 0);
        for ni in 0..2 {
            layers[0].params.act.init_act_vars(nrns.row_mut(ni, 0));
            nrns.set(ni, 0, NeuronVar::Ext, 1.0);
            nrns.set_flag(ni, 0, flags::HAS_EXT);
        }
        nrns.set_flag(1, 0, flags::OFF);
        let frozen = nrns.row(1, 0).to_vec();
        let mut pools = PoolArray::new(1);
        pools.push(0, 2, 0, true);

        let ctx = Context::new(1);
        let backend = SerialBackend::new();
        let mut spikes = 0;
        for _ in 0..50 {
            assert!(membrane(&ctx, topo, &mut nrns, &pools, &backend));
            spikes += nrns.get(0, 0, NeuronVar::Spike) as i32;
        }
        assert!(spikes > 0);
        assert_eq!(nrns.row(1, 0), frozen.as_slice());
    }

    #[test]
    fn test_non_finite_vm_reported() {
        let layers = input_layer();
        let topo = Topology {
            layers: &layers,
            conns: &[],
        };
        let mut nrns = NeuronArray::new(1);
        nrns.extend(2, 0);
        layers[0].params.act.init_act_vars(nrns.row_mut(0, 0));
        nrns.set(0, 0, NeuronVar::Vm, f32::NAN);
        let mut pools = PoolArray::new(1);
        pools.push(0, 2, 0, true);
        assert!(!membrane(&Context::new(1), topo, &mut nrns, &pools, &SerialBackend::new()));
    }
}
