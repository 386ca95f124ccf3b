// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phase 5: calcium
//!
//! Neuron Ca first, then a barrier, then synapse Ca, which reads the
//! just-updated CaSyn of both endpoints.

use spikenet_npu_neural::{Context, NeuronVar, SynCaVar};
use spikenet_npu_runtime::{flags, ComputeBackend, NeuronArray, SynapseArray};

use super::Topology;

/// Spike-driven and learning Ca cascades for every active (neuron, lane)
pub fn neuron_ca(topo: Topology<'_>, nrns: &mut NeuronArray, backend: &dyn ComputeBackend) {
    let NeuronArray {
        vals,
        flags: nrn_flags,
        layer,
        n_data,
        ..
    } = nrns;
    let (nrn_flags, layer): (&[u8], &[u32]) = (nrn_flags, layer);
    let n_data = *n_data;
    backend.for_each_row(vals, NeuronVar::COUNT, &|r, nrn| {
        if nrn_flags[r] & flags::OFF != 0 {
            return;
        }
        let lay = &topo.layers[layer[r / n_data] as usize];
        lay.params.learn.ca_from_spike(nrn);
    });
}

/// Synapse Ca for every (synapse, lane) of a learning connection
pub fn synapse_ca(
    ctx: &Context,
    topo: Topology<'_>,
    nrns: &NeuronArray,
    syns: &mut SynapseArray,
    backend: &dyn ComputeBackend,
) {
    let mode = ctx.syn_ca_mode;
    let ctr = ctx.syn_ca_ctr;
    let SynapseArray {
        ca,
        send,
        recv,
        conn,
        n_data,
        ..
    } = syns;
    let (send, recv, conn): (&[u32], &[u32], &[u32]) = (send, recv, conn);
    let n_data = *n_data;
    backend.for_each_row(ca, SynCaVar::COUNT, &|r, syn_ca| {
        let (si, di) = (r / n_data, r % n_data);
        let learn = &topo.conns[conn[si] as usize].params.learn;
        if !learn.learn {
            return;
        }
        learn.kinase_ca.syn_ca_update(
            mode,
            syn_ca,
            nrns.row(send[si] as usize, di),
            nrns.row(recv[si] as usize, di),
            ctr,
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_neural::{SynCaMode, VarRow};
    use spikenet_npu_runtime::{ConnParams, Connection, GBuf, Pattern, SerialBackend};

    fn conn(learn: bool) -> Connection {
        let mut params = ConnParams::default();
        params.learn.learn = learn;
        Connection {
            name: "AToB".to_string(),
            index: 0,
            send: 0,
            recv: 0,
            pattern: Pattern::default(),
            params,
            syn_st: 0,
            n_syns: 1,
            send_con: Vec::new(),
            recv_con: Vec::new(),
            recv_syn_idx: Vec::new(),
            gbuf: GBuf::new(1, 3, 1),
            gscale: 1.0,
        }
    }

    fn fixture() -> (NeuronArray, SynapseArray) {
        let mut nrns = NeuronArray::new(1);
        nrns.extend(2, 0);
        for ni in 0..2 {
            nrns.set(ni, 0, NeuronVar::CaSyn, 0.8);
            nrns.set(ni, 0, NeuronVar::CaSpkP, 0.8);
            nrns.set(ni, 0, NeuronVar::CaSpkD, 0.8);
        }
        let mut syns = SynapseArray::new(1);
        syns.push(0, 1, 0);
        (nrns, syns)
    }

    #[test]
    fn test_synapse_ca_follows_endpoints() {
        let conns = vec![conn(true)];
        let topo = Topology {
            layers: &[],
            conns: &conns,
        };
        let (nrns, mut syns) = fixture();
        let mut ctx = Context::new(1);
        ctx.syn_ca_mode = SynCaMode::Continuous;
        synapse_ca(&ctx, topo, &nrns, &mut syns, &SerialBackend::new());
        assert!(syns.ca_row(0, 0).var(SynCaVar::CaM) > 0.0);
        assert_eq!(syns.ca_row(0, 0).var(SynCaVar::CaUpT), 0.0);
    }

    #[test]
    fn test_non_learning_connection_untouched() {
        let conns = vec![conn(false)];
        let topo = Topology {
            layers: &[],
            conns: &conns,
        };
        let (nrns, mut syns) = fixture();
        let mut ctx = Context::new(1);
        ctx.syn_ca_mode = SynCaMode::Continuous;
        synapse_ca(&ctx, topo, &nrns, &mut syns, &SerialBackend::new());
        assert_eq!(syns.ca_row(0, 0).var(SynCaVar::CaUpT), -1.0);
        assert_eq!(syns.ca_row(0, 0).var(SynCaVar::CaM), 0.0);
    }
}
