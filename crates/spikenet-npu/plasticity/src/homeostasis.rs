// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Target-activity homeostasis and adaptive inhibition
//!
//! Each neuron carries a target share of its pool's activity (TrgAvg),
//! spread evenly over the configured range at initialization. AvgDif, the
//! gap between the actual and target share, drives synaptic scaling.

use rand::seq::SliceRandom;
use rand::Rng;
use spikenet_npu_neural::{NeuronAvgVar, VarRow};
use spikenet_npu_runtime::{ComputeBackend, Layer, NeuronArray};

/// Neurons per TrgAvg normalization group
fn trg_group_size(layer: &Layer) -> usize {
    if layer.params.learn.trg_avg_act.pool && layer.has_sub_pools() {
        layer.shape.pool_size()
    } else {
        layer.n_neurons
    }
}

/// Lane-shared average rows of a layer
fn layer_avgs<'a>(nrns: &'a mut NeuronArray, layer: &Layer) -> &'a mut [f32] {
    let c = NeuronAvgVar::COUNT;
    &mut nrns.avgs[layer.neur_st * c..(layer.neur_st + layer.n_neurons) * c]
}

/// Spreads TrgAvg evenly over `trg_range` within each group, optionally
/// permuted, and seeds ActAvg at `nominal * TrgAvg`
pub fn init_trg_avg<R: Rng + ?Sized>(layer: &Layer, nrns: &mut NeuronArray, rng: &mut R) {
    let ta = &layer.params.learn.trg_avg_act;
    let nominal = layer.nominal_act();
    let group = trg_group_size(layer);
    let inc = if group > 1 {
        (ta.trg_range.max - ta.trg_range.min) / (group - 1) as f32
    } else {
        0.0
    };
    let mut order: Vec<usize> = (0..group).collect();
    for chunk in layer_avgs(nrns, layer).chunks_exact_mut(group * NeuronAvgVar::COUNT) {
        if ta.permute {
            order.shuffle(rng);
        }
        for (j, avg) in chunk.chunks_exact_mut(NeuronAvgVar::COUNT).enumerate() {
            let trg = ta.trg_range.min + inc * order[j] as f32;
            avg.set_var(NeuronAvgVar::TrgAvg, trg);
            avg.set_var(NeuronAvgVar::AvgPct, trg);
            avg.set_var(NeuronAvgVar::ActAvg, nominal * trg);
            avg.set_var(NeuronAvgVar::AvgDif, 0.0);
            avg.set_var(NeuronAvgVar::DTrgAvg, 0.0);
        }
    }
}

/// Folds accumulated DTrgAvg into TrgAvg after subtracting the group mean
pub fn trg_avg_from_d(layer: &Layer, nrns: &mut NeuronArray, backend: &dyn ComputeBackend) {
    let ta = &layer.params.learn.trg_avg_act;
    if !layer.learns_trg_avg() || ta.err_lrate == 0.0 {
        return;
    }
    let group = trg_group_size(layer);
    let sub_mean = ta.sub_mean;
    let range = ta.trg_range;
    backend.for_each_row(
        layer_avgs(nrns, layer),
        group * NeuronAvgVar::COUNT,
        &|_, chunk| {
            let mut avg = 0.0f32;
            if sub_mean != 0.0 {
                for a in chunk.chunks_exact(NeuronAvgVar::COUNT) {
                    avg += a.var(NeuronAvgVar::DTrgAvg);
                }
                avg = sub_mean * avg / group as f32;
            }
            for a in chunk.chunks_exact_mut(NeuronAvgVar::COUNT) {
                let trg = range.clip(a.var(NeuronAvgVar::TrgAvg) + a.var(NeuronAvgVar::DTrgAvg) - avg);
                a.set_var(NeuronAvgVar::TrgAvg, trg);
                a.set_var(NeuronAvgVar::DTrgAvg, 0.0);
            }
        },
    );
}

/// AvgPct = ActAvg / pool mean ActAvg and AvgDif = AvgPct - TrgAvg, over
/// sub-pools when the layer has them
pub fn avg_dif_from_trg_avg(layer: &Layer, nrns: &mut NeuronArray, backend: &dyn ComputeBackend) {
    let group = if layer.has_sub_pools() {
        layer.shape.pool_size()
    } else {
        layer.n_neurons
    };
    backend.for_each_row(
        layer_avgs(nrns, layer),
        group * NeuronAvgVar::COUNT,
        &|_, chunk| {
            let mut plavg = 0.0f32;
            for a in chunk.chunks_exact(NeuronAvgVar::COUNT) {
                plavg += a.var(NeuronAvgVar::ActAvg);
            }
            plavg /= group as f32;
            for a in chunk.chunks_exact_mut(NeuronAvgVar::COUNT) {
                let apct = if plavg > 0.0 {
                    a.var(NeuronAvgVar::ActAvg) / plavg
                } else {
                    0.0
                };
                a.set_var(NeuronAvgVar::AvgPct, apct);
                a.set_var(NeuronAvgVar::AvgDif, apct - a.var(NeuronAvgVar::TrgAvg));
            }
        },
    );
}

/// Moves each lane's GiMult toward the nominal minus-phase activity
pub fn adapt_inhib(layer: &mut Layer) {
    let aa = &layer.params.inhib.act_avg;
    if !aa.adapt_gi || layer.is_input() {
        return;
    }
    for vals in layer.vals.iter_mut() {
        aa.adapt(&mut vals.gi_mult, vals.act_m_avg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use spikenet_npu_runtime::{LayerKind, LayerParams, LayerShape, LayerVals, SerialBackend};

    fn layer(dims: &[usize], kind: LayerKind) -> (Layer, NeuronArray) {
        let shape = LayerShape::new("L", dims).unwrap();
        let n = shape.n_units();
        let n_pools = 1 + shape.n_sub_pools();
        let mut nrns = NeuronArray::new(1);
        nrns.extend(n, 0);
        let mut params = LayerParams::default();
        params.update();
        let l = Layer {
            name: "L".to_string(),
            index: 0,
            kind,
            shape,
            neur_st: 0,
            n_neurons: n,
            pool_st: 0,
            n_pools,
            params,
            vals: vec![LayerVals::new(0.1)],
            lay_inhib: Vec::new(),
            recv_conns: Vec::new(),
            send_conns: Vec::new(),
        };
        (l, nrns)
    }

    #[test]
    fn test_init_spreads_range_per_pool() {
        let (l, mut nrns) = layer(&[1, 2, 2, 2], LayerKind::Hidden);
        let mut rng = StdRng::seed_from_u64(3);
        init_trg_avg(&l, &mut nrns, &mut rng);
        for pool in 0..2 {
            let mut trgs: Vec<f32> = (pool * 4..pool * 4 + 4)
                .map(|ni| nrns.get_avg(ni, NeuronAvgVar::TrgAvg))
                .collect();
            trgs.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(trgs, vec![0.5, 1.0, 1.5, 2.0]);
        }
        assert!((nrns.get_avg(0, NeuronAvgVar::ActAvg)
            - 0.1 * nrns.get_avg(0, NeuronAvgVar::TrgAvg))
        .abs()
            < 1e-7);
    }

    #[test]
    fn test_trg_avg_from_d_sub_mean() {
        let (l, mut nrns) = layer(&[4], LayerKind::Hidden);
        for ni in 0..4 {
            nrns.set_avg(ni, NeuronAvgVar::TrgAvg, 1.0);
        }
        nrns.set_avg(0, NeuronAvgVar::DTrgAvg, 0.4);
        trg_avg_from_d(&l, &mut nrns, &SerialBackend::new());
        // mean 0.1 subtracted everywhere
        assert!((nrns.get_avg(0, NeuronAvgVar::TrgAvg) - 1.3).abs() < 1e-6);
        assert!((nrns.get_avg(1, NeuronAvgVar::TrgAvg) - 0.9).abs() < 1e-6);
        assert_eq!(nrns.get_avg(0, NeuronAvgVar::DTrgAvg), 0.0);
    }

    #[test]
    fn test_target_layers_keep_trg_avg() {
        let (l, mut nrns) = layer(&[2], LayerKind::Target);
        nrns.set_avg(0, NeuronAvgVar::DTrgAvg, 0.4);
        trg_avg_from_d(&l, &mut nrns, &SerialBackend::new());
        assert_eq!(nrns.get_avg(0, NeuronAvgVar::DTrgAvg), 0.4);
    }

    #[test]
    fn test_avg_dif() {
        let (l, mut nrns) = layer(&[2], LayerKind::Hidden);
        nrns.set_avg(0, NeuronAvgVar::ActAvg, 0.3);
        nrns.set_avg(1, NeuronAvgVar::ActAvg, 0.1);
        nrns.set_avg(0, NeuronAvgVar::TrgAvg, 1.0);
        nrns.set_avg(1, NeuronAvgVar::TrgAvg, 1.0);
        avg_dif_from_trg_avg(&l, &mut nrns, &SerialBackend::new());
        assert!((nrns.get_avg(0, NeuronAvgVar::AvgPct) - 1.5).abs() < 1e-6);
        assert!((nrns.get_avg(1, NeuronAvgVar::AvgDif) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_avg_dif_silent_pool_is_zero() {
        let (l, mut nrns) = layer(&[3], LayerKind::Hidden);
        nrns.set_avg(0, NeuronAvgVar::TrgAvg, 1.0);
        avg_dif_from_trg_avg(&l, &mut nrns, &SerialBackend::new());
        assert_eq!(nrns.get_avg(0, NeuronAvgVar::AvgPct), 0.0);
        assert_eq!(nrns.get_avg(0, NeuronAvgVar::AvgDif), -1.0);
    }

    #[test]
    fn test_adapt_inhib() {
        let (mut l, _) = layer(&[4], LayerKind::Hidden);
        l.params.inhib.act_avg.adapt_gi = true;
        l.vals[0].act_m_avg = 0.3;
        adapt_inhib(&mut l);
        assert!(l.vals[0].gi_mult > 1.0);
    }
}
