// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phase 1: spike scatter and conductance gather
//!
//! Spikes emitted by the membrane phase of cycle `t - 1` are scattered on
//! cycle `t` into slot `(t + delay) % capacity` and drained by their
//! receivers on cycle `t + delay`. Write and read slots never coincide
//! because `capacity = delay + 1`.

use spikenet_npu_neural::{ComParams, ConnectionKind, Context, NeuronVar, SynapseVar, VarRow};
use spikenet_npu_runtime::{flags, ComputeBackend, NeuronArray, SynapseArray};

use super::Topology;

/// Adds `gscale * Wt` for every synapse of every spiking sender into its
/// receiver's write slot
pub fn scatter(
    ctx: &Context,
    topo: Topology<'_>,
    nrns: &NeuronArray,
    syns: &SynapseArray,
    backend: &dyn ComputeBackend,
) {
    let n_data = nrns.n_data;
    let cycle = ctx.cycles_total;
    for conn in topo.conns {
        if conn.n_syns == 0 || conn.gscale == 0.0 {
            continue;
        }
        let send = &topo.layers[conn.send];
        let recv_st = topo.layers[conn.recv].neur_st as u32;
        let slot = conn.params.com.write_slot(cycle);
        let gscale = conn.gscale;
        backend.for_each_index(send.n_neurons * n_data, &|k| {
            let (s, di) = (k / n_data, k % n_data);
            let ni = send.neur_st + s;
            if nrns.get(ni, di, NeuronVar::Spike) == 0.0 || nrns.has_flag(ni, di, flags::OFF) {
                return;
            }
            for si in conn.send_con[s].range() {
                let wt = syns.vals[si * SynapseVar::COUNT + SynapseVar::Wt.index()];
                if wt == 0.0 {
                    continue;
                }
                let ri = (syns.recv[si] - recv_st) as usize;
                conn.gbuf.add(ri, slot, di, ComParams::float_to_int(gscale * wt));
            }
        });
    }
}

/// Drains every receiving buffer's read slot into GeRaw and GiRaw.
/// Connections are summed in receive order, so the result is independent
/// of dispatch.
pub fn gather(ctx: &Context, topo: Topology<'_>, nrns: &mut NeuronArray, backend: &dyn ComputeBackend) {
    let NeuronArray {
        vals,
        flags: nrn_flags,
        layer,
        n_data,
        ..
    } = nrns;
    let n_data = *n_data;
    let (nrn_flags, layer): (&[u8], &[u32]) = (nrn_flags, layer);
    let cycle = ctx.cycles_total;
    backend.for_each_row(vals, NeuronVar::COUNT, &|r, nrn| {
        let (ni, di) = (r / n_data, r % n_data);
        let lay = &topo.layers[layer[ni] as usize];
        let ri = ni - lay.neur_st;
        let mut ge = 0.0f32;
        let mut gi = 0.0f32;
        for &ci in &lay.recv_conns {
            let conn = &topo.conns[ci];
            let v = ComParams::int_to_float(conn.gbuf.take(ri, conn.params.com.read_slot(cycle), di));
            match conn.kind() {
                ConnectionKind::Excitatory => ge += v,
                ConnectionKind::Inhibitory => gi += v,
            }
        }
        // off neurons drain their slots but keep their row
        if nrn_flags[r] & flags::OFF != 0 {
            return;
        }
        nrn.set_var(NeuronVar::GeRaw, ge);
        nrn.set_var(NeuronVar::GiRaw, gi);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_runtime::{
        ConnParams, Connection, GBuf, Layer, LayerKind, LayerParams, LayerShape, LayerVals,
        Pattern, SerialBackend,
    };

    fn layer(name: &str, index: usize, neur_st: usize, n: usize) -> Layer {
        Layer {
            name: name.to_string(),
            index,
            kind: LayerKind::Hidden,
            shape: LayerShape::new(name, &[n]).unwrap(),
            neur_st,
            n_neurons: n,
            pool_st: index,
            n_pools: 1,
            params: LayerParams::default(),
            vals: vec![LayerVals::new(0.1)],
            lay_inhib: Vec::new(),
            recv_conns: Vec::new(),
            send_conns: Vec::new(),
        }
    }

    /// 2 senders fully connected to 1 receiver, delay 2
    fn fixture(kind: ConnectionKind) -> (Vec<Layer>, Vec<Connection>, NeuronArray, SynapseArray) {
        let mut nrns = NeuronArray::new(1);
        nrns.extend(2, 0);
        nrns.extend(1, 1);
        let mut a = layer("A", 0, 0, 2);
        let mut b = layer("B", 1, 2, 1);
        a.send_conns.push(0);
        b.recv_conns.push(0);

        let mut syns = SynapseArray::new(1);
        let pairs = vec![(0u32, 0u32), (1, 0)];
        for &(s, r) in &pairs {
            let si = syns.push(s, 2 + r, 0);
            syns.set(si, SynapseVar::Wt, 0.5);
        }
        let mut params = ConnParams::default();
        params.com.kind = kind;
        let mut conn = Connection {
            name: "AToB".to_string(),
            index: 0,
            send: 0,
            recv: 1,
            pattern: Pattern::default(),
            gbuf: GBuf::new(1, params.com.capacity() as usize, 1),
            params,
            syn_st: 0,
            n_syns: 0,
            send_con: Vec::new(),
            recv_con: Vec::new(),
            recv_syn_idx: Vec::new(),
            gscale: 1.0,
        };
        conn.index_pairs(&pairs, 2, 1);
        (vec![a, b], vec![conn], nrns, syns)
    }

    #[test]
    fn test_spike_arrives_after_delay() {
        let (layers, conns, mut nrns, syns) = fixture(ConnectionKind::Excitatory);
        let backend = SerialBackend::new();
        let topo = Topology {
            layers: &layers,
            conns: &conns,
        };
        let mut ctx = Context::new(1);
        nrns.set(0, 0, NeuronVar::Spike, 1.0);
        nrns.set(1, 0, NeuronVar::Spike, 1.0);

        let mut seen = Vec::new();
        for _ in 0..4 {
            scatter(&ctx, topo, &nrns, &syns, &backend);
            gather(&ctx, topo, &mut nrns, &backend);
            seen.push(nrns.get(2, 0, NeuronVar::GeRaw));
            nrns.set(0, 0, NeuronVar::Spike, 0.0);
            nrns.set(1, 0, NeuronVar::Spike, 0.0);
            ctx.cycle_inc();
        }
        assert_eq!(seen, vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(nrns.get(2, 0, NeuronVar::GiRaw), 0.0);
    }

    #[test]
    fn test_inhibitory_goes_to_gi_raw() {
        let (layers, conns, mut nrns, syns) = fixture(ConnectionKind::Inhibitory);
        let backend = SerialBackend::new();
        let topo = Topology {
            layers: &layers,
            conns: &conns,
        };
        let mut ctx = Context::new(1);
        nrns.set(1, 0, NeuronVar::Spike, 1.0);
        scatter(&ctx, topo, &nrns, &syns, &backend);
        ctx.cycle_inc();
        ctx.cycle_inc();
        gather(&ctx, topo, &mut nrns, &backend);
        assert_eq!(nrns.get(2, 0, NeuronVar::GiRaw), 0.5);
        assert_eq!(nrns.get(2, 0, NeuronVar::GeRaw), 0.0);
    }

    #[test]
    fn test_failed_synapse_sends_nothing() {
        let (layers, conns, mut nrns, mut syns) = fixture(ConnectionKind::Excitatory);
        syns.set(0, SynapseVar::Wt, 0.0);
        let backend = SerialBackend::new();
        let topo = Topology {
            layers: &layers,
            conns: &conns,
        };
        let mut ctx = Context::new(1);
        nrns.set(0, 0, NeuronVar::Spike, 1.0);
        scatter(&ctx, topo, &nrns, &syns, &backend);
        ctx.cycle_inc();
        ctx.cycle_inc();
        gather(&ctx, topo, &mut nrns, &backend);
        assert_eq!(nrns.get(2, 0, NeuronVar::GeRaw), 0.0);
    }
}
