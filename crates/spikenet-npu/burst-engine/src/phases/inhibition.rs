// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phase 3: inhibition
//!
//! Three barriered steps:
//! 1. layer-level FFFB (plus background inhibition) on every whole-layer pool
//! 2. between-layer max: each layer takes the max of its own Gi and the Gi
//!    of its `lay_inhib` sources, read from a snapshot taken after step 1
//! 3. sub-pool FFFB, combined with the final layer Gi
//!
//! Reading from snapshots keeps every step independent of pool order.

use spikenet_npu_neural::{PoolVar, VarRow};
use spikenet_npu_runtime::{ComputeBackend, PoolArray};

use super::Topology;

pub fn inhibition(topo: Topology<'_>, pools: &mut PoolArray, backend: &dyn ComputeBackend) {
    layer_inhib(topo, pools, backend);
    let lay_gi = between_layer_max(topo, pools);
    sub_pool_inhib(topo, pools, &lay_gi, backend);
}

fn layer_inhib(topo: Topology<'_>, pools: &mut PoolArray, backend: &dyn ComputeBackend) {
    let PoolArray {
        vals,
        layer,
        is_layer,
        n_data,
        ..
    } = pools;
    let (layer, is_layer): (&[u32], &[bool]) = (layer, is_layer);
    let n_data = *n_data;
    backend.for_each_row(vals, PoolVar::COUNT, &|r, pl| {
        let (pi, di) = (r / n_data, r % n_data);
        if !is_layer[pi] {
            return;
        }
        let lay = &topo.layers[layer[pi] as usize];
        let inhib = &lay.params.inhib;
        inhib.layer.inhib(pl, lay.vals[di].gi_mult);
        if inhib.layer.on {
            let gi_bg = inhib.bg.gi_bg(pl.var(PoolVar::GiBg), pl.var(PoolVar::GiOrig));
            pl.set_var(PoolVar::GiBg, gi_bg);
            pl.add_var(PoolVar::Gi, gi_bg);
        }
    });
}

/// Applies the between-layer max and returns the final layer Gi per
/// `(layer, lane)`, indexed `li * n_data + di`
fn between_layer_max(topo: Topology<'_>, pools: &mut PoolArray) -> Vec<f32> {
    let n_data = pools.n_data;
    let own: Vec<f32> = topo
        .layers
        .iter()
        .flat_map(|lay| (0..n_data).map(move |di| (lay.pool_st, di)))
        .map(|(pi, di)| pools.get(pi, di, PoolVar::Gi))
        .collect();

    let mut fin = own.clone();
    for lay in topo.layers {
        for di in 0..n_data {
            let k = lay.index * n_data + di;
            let gi = lay
                .lay_inhib
                .iter()
                .fold(own[k], |gi, &src| gi.max(own[src * n_data + di]));
            fin[k] = gi;
            pools.set(lay.pool_st, di, PoolVar::Gi, gi);
            pools.set(lay.pool_st, di, PoolVar::LayGi, gi);
        }
    }
    fin
}

fn sub_pool_inhib(
    topo: Topology<'_>,
    pools: &mut PoolArray,
    lay_gi: &[f32],
    backend: &dyn ComputeBackend,
) {
    let PoolArray {
        vals,
        layer,
        is_layer,
        n_data,
        ..
    } = pools;
    let (layer, is_layer): (&[u32], &[bool]) = (layer, is_layer);
    let n_data = *n_data;
    backend.for_each_row(vals, PoolVar::COUNT, &|r, pl| {
        let (pi, di) = (r / n_data, r % n_data);
        if is_layer[pi] {
            return;
        }
        let li = layer[pi] as usize;
        let lay = &topo.layers[li];
        lay.params
            .inhib
            .sub_pool_gi(pl, lay_gi[li * n_data + di], lay.vals[di].gi_mult);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_neural::GiParams;
    use spikenet_npu_runtime::{
        Layer, LayerKind, LayerParams, LayerShape, LayerVals, SerialBackend,
    };

    fn layer(name: &str, index: usize, dims: &[usize], pool_st: usize) -> Layer {
        let shape = LayerShape::new(name, dims).unwrap();
        let n = shape.n_units();
        let n_pools = 1 + shape.n_sub_pools();
        let mut params = LayerParams::default();
        params.update();
        Layer {
            name: name.to_string(),
            index,
            kind: LayerKind::Hidden,
            shape,
            neur_st: 0,
            n_neurons: n,
            pool_st,
            n_pools,
            params,
            vals: vec![LayerVals::new(0.1)],
            lay_inhib: Vec::new(),
            recv_conns: Vec::new(),
            send_conns: Vec::new(),
        }
    }

    #[test]
    fn test_between_layer_max() {
        let a = layer("A", 0, &[4], 0);
        let mut b = layer("B", 1, &[4], 1);
        b.lay_inhib.push(0);
        let layers = vec![a, b];
        let topo = Topology {
            layers: &layers,
            conns: &[],
        };
        let mut pools = PoolArray::new(1);
        pools.push(0, 4, 0, true);
        pools.push(4, 8, 1, true);
        // A is strongly driven, B is silent
        pools.set(0, 0, PoolVar::FFs, 2.0);

        inhibition(topo, &mut pools, &SerialBackend::new());
        let a_gi = pools.get(0, 0, PoolVar::Gi);
        assert!(a_gi > 0.0);
        assert_eq!(pools.get(1, 0, PoolVar::Gi), a_gi);
        assert_eq!(pools.get(1, 0, PoolVar::GiOrig), 0.0);
    }

    #[test]
    fn test_sub_pools_see_final_layer_gi() {
        let mut l = layer("P", 0, &[1, 2, 2, 2], 0);
        l.params.inhib.pool = GiParams::default();
        let layers = vec![l];
        let topo = Topology {
            layers: &layers,
            conns: &[],
        };
        let mut pools = PoolArray::new(1);
        pools.push(0, 8, 0, true);
        pools.push(0, 4, 0, false);
        pools.push(4, 8, 0, false);
        pools.set(0, 0, PoolVar::FFs, 1.0);
        pools.set(1, 0, PoolVar::FFs, 2.0);

        inhibition(topo, &mut pools, &SerialBackend::new());
        let lay_gi = pools.get(0, 0, PoolVar::Gi);
        assert_eq!(pools.get(1, 0, PoolVar::LayGi), lay_gi);
        assert_eq!(pools.get(2, 0, PoolVar::LayGi), lay_gi);
        // silent sub-pool is lifted to the layer level
        assert_eq!(pools.get(2, 0, PoolVar::Gi), lay_gi);
        assert!(pools.get(1, 0, PoolVar::Gi) >= lay_gi);
    }
}
