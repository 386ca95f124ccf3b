// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Trial-level phase bookkeeping: state decay between trials, minus/plus
//! phase snapshots, homeostatic averages, RLRate and CorSim

use spikenet_npu_neural::{decay_inhib, NeuronAvgVar, NeuronVar, PoolVar, ThetaPhase, VarRow};
use spikenet_npu_runtime::{flags, NeuronArray, PoolArray};
use tracing::trace;

use super::Network;
use crate::stats::cor_sim;

impl Network {
    /// Starts a new trial: decays activation and inhibition state, captures
    /// FFAvgPrv, clears pool statistics and every conductance buffer, and
    /// redraws synaptic failures.
    pub fn new_state(&mut self, testing: bool) {
        self.ctx.new_state(testing);
        let n_data = self.neurons.n_data;
        let layers = &self.layers;
        let backend = self.backend.as_ref();

        let PoolArray { vals, layer, .. } = &mut self.pools;
        let pool_layer: &[u32] = layer;
        backend.for_each_row(vals, PoolVar::COUNT, &|r, pl| {
            let lay = &layers[pool_layer[r / n_data] as usize];
            pl.set_var(PoolVar::FFAvgPrv, pl.var(PoolVar::FFAvg));
            decay_inhib(pl, lay.params.act.decay.act);
            for v in [
                PoolVar::ActAvg,
                PoolVar::ActMax,
                PoolVar::CaSpkPAvg,
                PoolVar::CaSpkPMax,
            ] {
                pl.set_var(v, 0.0);
            }
        });

        let NeuronArray { vals, layer, .. } = &mut self.neurons;
        let nrn_layer: &[u32] = layer;
        backend.for_each_row(vals, NeuronVar::COUNT, &|r, nrn| {
            let act = &layers[nrn_layer[r / n_data] as usize].params.act;
            act.decay_state(nrn, act.decay.act, act.decay.glong);
        });

        for conn in &self.conns {
            conn.gbuf.clear();
        }
        if self.conns.iter().any(|c| c.params.com.p_fail > 0.0) {
            self.syn_fail();
        }
        trace!(trial = self.ctx.trial, testing, "[NETWORK] new state");
    }

    /// End of the minus phase: ActM and CaSpkPM snapshots, pool ActMAvg and
    /// the layer running ActMAvg
    pub fn minus_phase(&mut self) {
        let n_data = self.neurons.n_data;
        self.backend
            .for_each_row(&mut self.neurons.vals, NeuronVar::COUNT, &|_, nrn| {
                nrn.set_var(NeuronVar::ActM, nrn.var(NeuronVar::ActInt));
                nrn.set_var(NeuronVar::CaSpkPM, nrn.var(NeuronVar::CaSpkP));
            });
        self.pool_act_avg(NeuronVar::ActM, PoolVar::ActMAvg);
        if !self.ctx.testing {
            for lay in self.layers.iter_mut() {
                let dt = lay.params.inhib.act_avg.avg_dt;
                for di in 0..n_data {
                    let pool_avg = self.pools.get(lay.pool_st, di, PoolVar::ActMAvg);
                    let v = &mut lay.vals[di];
                    v.act_m_avg += dt * (pool_avg - v.act_m_avg);
                }
            }
        }
    }

    /// Switches to the plus phase and clamps target layers to their targets
    pub fn plus_phase_start(&mut self) {
        self.ctx.new_phase(ThetaPhase::Plus);
        let n_data = self.neurons.n_data;
        for lay in self.layers.iter().filter(|l| l.is_target()) {
            for ni in lay.neurons() {
                for di in 0..n_data {
                    if !self.neurons.has_flag(ni, di, flags::HAS_TARG) {
                        continue;
                    }
                    let nrn = self.neurons.row_mut(ni, di);
                    nrn.set_var(NeuronVar::Ext, nrn.var(NeuronVar::Target));
                    nrn.set_var(NeuronVar::Isi, -1.0);
                    nrn.set_var(NeuronVar::IsiAvg, -1.0);
                    nrn.set_var(NeuronVar::ActInt, 0.0);
                    self.neurons.set_flag(ni, di, flags::HAS_EXT);
                }
            }
        }
    }

    /// End of the plus phase: ActP snapshot, pool and layer ActPAvg,
    /// homeostatic averages (learning trials only), RLRate and CorSim
    pub fn plus_phase(&mut self) {
        let n_data = self.neurons.n_data;
        let backend = self.backend.as_ref();
        backend.for_each_row(&mut self.neurons.vals, NeuronVar::COUNT, &|_, nrn| {
            nrn.set_var(NeuronVar::ActP, nrn.var(NeuronVar::ActInt));
        });
        self.pool_act_avg(NeuronVar::ActP, PoolVar::ActPAvg);

        if !self.ctx.testing {
            for lay in self.layers.iter_mut() {
                let dt = lay.params.inhib.act_avg.avg_dt;
                for di in 0..n_data {
                    let pool_avg = self.pools.get(lay.pool_st, di, PoolVar::ActPAvg);
                    let v = &mut lay.vals[di];
                    v.act_p_avg += dt * (pool_avg - v.act_p_avg);
                }
            }
            self.neuron_avgs();
        }
        self.rl_rate();
        self.update_cor_sim();
    }

    /// Records CaSpkP into SpkSt1
    pub fn spk_st1(&mut self) {
        self.backend
            .for_each_row(&mut self.neurons.vals, NeuronVar::COUNT, &|_, nrn| {
                nrn.set_var(NeuronVar::SpkSt1, nrn.var(NeuronVar::CaSpkP));
            });
    }

    /// Records CaSpkP into SpkSt2
    pub fn spk_st2(&mut self) {
        self.backend
            .for_each_row(&mut self.neurons.vals, NeuronVar::COUNT, &|_, nrn| {
                nrn.set_var(NeuronVar::SpkSt2, nrn.var(NeuronVar::CaSpkP));
            });
    }

    /// Pool mean of a neuron variable over active neurons
    fn pool_act_avg(&mut self, src: NeuronVar, dst: PoolVar) {
        let nrns = &self.neurons;
        let PoolArray {
            vals, st, ed, n_data, ..
        } = &mut self.pools;
        let (st, ed): (&[u32], &[u32]) = (st, ed);
        let n_data = *n_data;
        self.backend.for_each_row(vals, PoolVar::COUNT, &|r, pl| {
            let (pi, di) = (r / n_data, r % n_data);
            let mut sum = 0.0f32;
            let mut n = 0usize;
            for ni in st[pi] as usize..ed[pi] as usize {
                if nrns.has_flag(ni, di, flags::OFF) {
                    continue;
                }
                sum += nrns.get(ni, di, src);
                n += 1;
            }
            pl.set_var(dst, PoolArray::avg(sum, n));
        });
    }

    /// Long-run ActAvg and DTrgAvg accumulation, lanes folded in order
    fn neuron_avgs(&mut self) {
        let layers = &self.layers;
        let NeuronArray {
            vals,
            avgs,
            layer,
            n_data,
            ..
        } = &mut self.neurons;
        let (vals, layer): (&[f32], &[u32]) = (vals, layer);
        let n_data = *n_data;
        self.backend
            .for_each_row(avgs, NeuronAvgVar::COUNT, &|ni, avg| {
                let lay = &layers[layer[ni] as usize];
                let dt = lay.params.act.dt.long_avg_dt;
                let err_lrate = lay.params.learn.trg_avg_act.err_lrate;
                let learns = lay.learns_trg_avg();
                for di in 0..n_data {
                    let st = (ni * n_data + di) * NeuronVar::COUNT;
                    let nrn = &vals[st..st + NeuronVar::COUNT];
                    let a = avg.var(NeuronAvgVar::ActAvg);
                    avg.set_var(NeuronAvgVar::ActAvg, a + dt * (nrn.var(NeuronVar::ActM) - a));
                    if learns {
                        avg.add_var(
                            NeuronAvgVar::DTrgAvg,
                            err_lrate * (nrn.var(NeuronVar::CaSpkP) - nrn.var(NeuronVar::CaSpkD)),
                        );
                    }
                }
            });
    }

    /// Receiver learning-rate modulation from plus-phase Ca
    fn rl_rate(&mut self) {
        let layers = &self.layers;
        let pools = &self.pools;
        let NeuronArray {
            vals,
            layer,
            n_data,
            ..
        } = &mut self.neurons;
        let layer: &[u32] = layer;
        let n_data = *n_data;
        self.backend.for_each_row(vals, NeuronVar::COUNT, &|r, nrn| {
            let (ni, di) = (r / n_data, r % n_data);
            let lay = &layers[layer[ni] as usize];
            let rl = &lay.params.learn.rl_rate;
            let ca_p = nrn.var(NeuronVar::CaSpkP);
            let ca_d = nrn.var(NeuronVar::CaSpkD);
            let lay_max = pools.get(lay.pool_st, di, PoolVar::CaSpkPMax);
            let rate = rl.rlrate_sig_deriv(ca_p, lay_max) * rl.rlrate_diff(ca_p, ca_d);
            nrn.set_var(NeuronVar::RlRate, rate);
        });
    }

    /// Centered cosine between ActM and ActP for every layer and lane
    fn update_cor_sim(&mut self) {
        let n_data = self.neurons.n_data;
        for lay in self.layers.iter_mut() {
            for di in 0..n_data {
                let act_m: Vec<f32> = lay
                    .neurons()
                    .map(|ni| self.neurons.get(ni, di, NeuronVar::ActM))
                    .collect();
                let act_p: Vec<f32> = lay
                    .neurons()
                    .map(|ni| self.neurons.get(ni, di, NeuronVar::ActP))
                    .collect();
                let avg_m = self.pools.get(lay.pool_st, di, PoolVar::ActMAvg);
                let avg_p = self.pools.get(lay.pool_st, di, PoolVar::ActPAvg);
                let cor = cor_sim(&act_m, &act_p, avg_m, avg_p);
                let cs = &mut lay.vals[di].cor_sim;
                cs.cor = cor;
                lay.params.act.dt.avg_var_update(&mut cs.avg, &mut cs.var, cor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::NetworkBuilder;
    use crate::input::ExtPattern;
    use spikenet_npu_neural::{NeuronVar, PoolVar, ThetaPhase};
    use spikenet_npu_runtime::{flags, LayerKind, Pattern};

    fn net() -> super::Network {
        NetworkBuilder::new("phases")
            .seed(5)
            .layer("In", &[4], LayerKind::Input)
            .layer("Out", &[4], LayerKind::Target)
            .connect("In", "Out", Pattern::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_minus_phase_snapshots() {
        let mut n = net();
        n.apply_ext("In", 0, &ExtPattern::flat(vec![1.0, 0.0, 1.0, 0.0]))
            .unwrap();
        n.new_state(false);
        n.cycles(30).unwrap();
        n.minus_phase();
        for ni in 0..8 {
            assert_eq!(
                n.neurons.get(ni, 0, NeuronVar::ActM),
                n.neurons.get(ni, 0, NeuronVar::ActInt)
            );
        }
        let pool_avg = n.pools.get(0, 0, PoolVar::ActMAvg);
        let mean = (0..4).map(|ni| n.neurons.get(ni, 0, NeuronVar::ActM)).sum::<f32>() / 4.0;
        assert!((pool_avg - mean).abs() < 1e-6);
    }

    #[test]
    fn test_plus_phase_start_clamps_targets() {
        let mut n = net();
        n.apply_ext("Out", 0, &ExtPattern::flat(vec![0.0, 1.0, 0.0, 1.0]))
            .unwrap();
        n.new_state(false);
        n.plus_phase_start();
        assert_eq!(n.ctx.phase, ThetaPhase::Plus);
        assert_eq!(n.neurons.get(5, 0, NeuronVar::Ext), 1.0);
        assert!(n.neurons.has_flag(5, 0, flags::HAS_EXT));
        assert_eq!(n.neurons.get(5, 0, NeuronVar::IsiAvg), -1.0);
    }

    #[test]
    fn test_spk_st_snapshots() {
        let mut n = net();
        n.neurons.set(2, 0, NeuronVar::CaSpkP, 0.4);
        n.spk_st1();
        n.neurons.set(2, 0, NeuronVar::CaSpkP, 0.7);
        n.spk_st2();
        assert_eq!(n.neurons.get(2, 0, NeuronVar::SpkSt1), 0.4);
        assert_eq!(n.neurons.get(2, 0, NeuronVar::SpkSt2), 0.7);
    }

    #[test]
    fn test_testing_trial_keeps_layer_averages() {
        let mut n = net();
        let before = n.layers[1].vals[0];
        n.new_state(true);
        n.cycles(10).unwrap();
        n.minus_phase();
        n.plus_phase_start();
        n.cycles(10).unwrap();
        n.plus_phase();
        assert_eq!(n.layers[1].vals[0].act_m_avg, before.act_m_avg);
        assert_eq!(n.layers[1].vals[0].act_p_avg, before.act_p_avg);
    }
}
