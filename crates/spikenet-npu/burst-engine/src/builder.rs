// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Network Construction
//!
//! [`NetworkBuilder`] collects layer and connection declarations, then
//! [`build`](NetworkBuilder::build) lays out the arenas in stages:
//!
//! 1. **Validation**: names, shapes, parameters and references
//! 2. **Neurons and pools**: each layer's neuron range, its whole-layer pool,
//!    then one pool per 4D sub-pool
//! 3. **Synapses**: pattern expansion, per-connection indexes and buffers
//! 4. **Scaling**: conductance scale from relative strengths into each receiver
//! 5. **Initial state**: seeded weights and target activities, resting neurons
//!
//! Any failure aborts the whole build; nothing partially built escapes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spikenet_npu_neural::{ConnectionKind, Context, NetError, Result, SynCaMode};
use spikenet_npu_runtime::{
    ConnParams, Connection, GBuf, Layer, LayerKind, LayerParams, LayerShape, LayerVals,
    NeuronArray, Pattern, PoolArray, SynapseArray, MAX_LAY_INHIB,
};
use tracing::{debug, info};

use crate::backend::{create_backend, BackendConfig, BackendType};
use crate::network::Network;

/// Plus-phase cycles when not set explicitly
pub const DEFAULT_PLUS_CYCLES: i32 = 50;

#[derive(Debug, Clone)]
struct LayerSpec {
    name: String,
    dims: Vec<usize>,
    kind: LayerKind,
    params: LayerParams,
}

#[derive(Debug, Clone)]
struct ConnSpec {
    send: String,
    recv: String,
    pattern: Pattern,
    params: ConnParams,
}

/// Declarative network description
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    name: String,
    n_data: usize,
    seed: u64,
    theta_cycles: i32,
    plus_cycles: i32,
    slow_interval: i32,
    syn_ca_mode: SynCaMode,
    backend_type: BackendType,
    backend_config: BackendConfig,
    layers: Vec<LayerSpec>,
    lay_inhib: Vec<(String, Vec<String>)>,
    conns: Vec<ConnSpec>,
}

impl NetworkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let ctx = Context::new(1);
        Self {
            name: name.into(),
            n_data: 1,
            seed: 0,
            theta_cycles: ctx.theta_cycles,
            plus_cycles: DEFAULT_PLUS_CYCLES,
            slow_interval: ctx.slow_interval,
            syn_ca_mode: ctx.syn_ca_mode,
            backend_type: BackendType::default(),
            backend_config: BackendConfig::default(),
            layers: Vec::new(),
            lay_inhib: Vec::new(),
            conns: Vec::new(),
        }
    }

    /// Independent data lanes processed in lockstep
    pub fn n_data(mut self, n_data: usize) -> Self {
        self.n_data = n_data;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn theta_cycles(mut self, cycles: i32) -> Self {
        self.theta_cycles = cycles;
        self
    }

    pub fn plus_cycles(mut self, cycles: i32) -> Self {
        self.plus_cycles = cycles;
        self
    }

    pub fn slow_interval(mut self, trials: i32) -> Self {
        self.slow_interval = trials;
        self
    }

    pub fn syn_ca_mode(mut self, mode: SynCaMode) -> Self {
        self.syn_ca_mode = mode;
        self
    }

    pub fn backend(mut self, backend_type: BackendType) -> Self {
        self.backend_type = backend_type;
        self
    }

    pub fn backend_config(mut self, config: BackendConfig) -> Self {
        self.backend_config = config;
        self
    }

    /// Adds a layer with the defaults for its kind
    pub fn layer(self, name: &str, dims: &[usize], kind: LayerKind) -> Self {
        self.layer_with(name, dims, kind, LayerParams::for_kind(kind))
    }

    pub fn layer_with(
        mut self,
        name: &str,
        dims: &[usize],
        kind: LayerKind,
        params: LayerParams,
    ) -> Self {
        self.layers.push(LayerSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            kind,
            params,
        });
        self
    }

    /// Layers whose pool inhibition `layer` shares by taking the max.
    /// Names are resolved at build time.
    pub fn lay_inhib(mut self, layer: &str, sources: &[&str]) -> Self {
        self.lay_inhib.push((
            layer.to_string(),
            sources.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn connect(self, send: &str, recv: &str, pattern: Pattern) -> Self {
        self.connect_with(send, recv, pattern, ConnParams::default())
    }

    pub fn connect_with(
        mut self,
        send: &str,
        recv: &str,
        pattern: Pattern,
        params: ConnParams,
    ) -> Self {
        self.conns.push(ConnSpec {
            send: send.to_string(),
            recv: recv.to_string(),
            pattern,
            params,
        });
        self
    }

    pub fn build(self) -> Result<Network> {
        info!(
            network = %self.name,
            layers = self.layers.len(),
            connections = self.conns.len(),
            n_data = self.n_data,
            "[NETWORK] building"
        );
        let ctx = self.context()?;

        // Stage 1: validation
        let (mut layers, names) = self.layer_descriptors()?;
        let mut conns = Vec::with_capacity(self.conns.len());
        let mut pairs = Vec::with_capacity(self.conns.len());
        for (ci, spec) in self.conns.iter().enumerate() {
            let (conn, p) = self.connection_descriptor(ci, spec, &layers, &names)?;
            layers[conn.send].send_conns.push(ci);
            layers[conn.recv].recv_conns.push(ci);
            pairs.push(p);
            conns.push(conn);
        }

        // Stage 2: neurons and pools
        let mut neurons = NeuronArray::new(self.n_data);
        let mut pools = PoolArray::new(self.n_data);
        for lay in layers.iter_mut() {
            lay_out_layer(lay, &mut neurons, &mut pools);
        }

        // Stage 3: synapses
        let n_syns: usize = pairs.iter().map(Vec::len).sum();
        let mut synapses = SynapseArray::with_capacity(self.n_data, n_syns);
        for (conn, p) in conns.iter_mut().zip(&pairs) {
            let send = &layers[conn.send];
            let recv = &layers[conn.recv];
            conn.syn_st = synapses.n_syns;
            for &(s, r) in p {
                synapses.push(
                    (send.neur_st + s as usize) as u32,
                    (recv.neur_st + r as usize) as u32,
                    conn.index as u32,
                );
            }
            conn.index_pairs(p, send.n_neurons, recv.n_neurons);
            conn.gbuf = GBuf::new(
                recv.n_neurons,
                conn.params.com.capacity() as usize,
                self.n_data,
            );
            debug!(
                connection = %conn.name,
                synapses = conn.n_syns,
                "[NETWORK] connection laid out"
            );
        }

        // Stage 4: scaling
        set_gscales(&layers, &mut conns);

        // Stage 5: initial state
        let mut rng = StdRng::seed_from_u64(self.seed);
        for lay in &layers {
            spikenet_npu_plasticity::init_trg_avg(lay, &mut neurons, &mut rng);
        }
        for conn in &conns {
            let swt = &conn.params.swt;
            for si in conn.synapses() {
                swt.init_wts_syn(
                    synapses.row_mut(si),
                    rng.gen::<f32>(),
                    swt.init.mean,
                    swt.init.spct,
                );
            }
        }
        synapses.init_ca();
        for lay in &layers {
            for ni in lay.neurons() {
                for di in 0..self.n_data {
                    lay.params.act.init_act_vars(neurons.row_mut(ni, di));
                }
            }
        }

        let backend = create_backend(
            self.backend_type,
            neurons.n_neurons,
            synapses.n_syns,
            &self.backend_config,
        )?;
        info!(
            network = %self.name,
            neurons = neurons.n_neurons,
            synapses = synapses.n_syns,
            pools = pools.n_pools,
            backend = backend.backend_name(),
            "[NETWORK] built"
        );

        Ok(Network::from_parts(
            self.name,
            ctx,
            layers,
            conns,
            neurons,
            synapses,
            pools,
            self.plus_cycles,
            self.seed,
            backend,
        ))
    }

    fn context(&self) -> Result<Context> {
        if self.n_data == 0 {
            return Err(NetError::InvalidParameter("n_data must be at least 1".to_string()));
        }
        if self.theta_cycles <= 0 {
            return Err(NetError::InvalidParameter(format!(
                "theta_cycles must be positive, got {}",
                self.theta_cycles
            )));
        }
        if self.plus_cycles <= 0 || self.plus_cycles >= self.theta_cycles {
            return Err(NetError::InvalidParameter(format!(
                "plus_cycles must lie in 1..{}, got {}",
                self.theta_cycles, self.plus_cycles
            )));
        }
        if self.slow_interval <= 0 {
            return Err(NetError::InvalidParameter(format!(
                "slow_interval must be positive, got {}",
                self.slow_interval
            )));
        }
        let mut ctx = Context::new(self.n_data as u32);
        ctx.theta_cycles = self.theta_cycles;
        ctx.slow_interval = self.slow_interval;
        ctx.syn_ca_mode = self.syn_ca_mode;
        Ok(ctx)
    }

    fn layer_descriptors(&self) -> Result<(Vec<Layer>, ahash::AHashMap<String, usize>)> {
        let mut names = ahash::AHashMap::with_capacity(self.layers.len());
        for (li, spec) in self.layers.iter().enumerate() {
            if names.insert(spec.name.clone(), li).is_some() {
                return Err(NetError::DuplicateLayer(spec.name.clone()));
            }
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        for (li, spec) in self.layers.iter().enumerate() {
            let shape = LayerShape::new(&spec.name, &spec.dims)?;
            let mut params = spec.params.clone();
            params.act.clamp.is_input = spec.kind == LayerKind::Input;
            params.act.clamp.is_target = spec.kind == LayerKind::Target;
            params.validate().map_err(|e| {
                NetError::InvalidParameter(format!("layer {}: {}", spec.name, e))
            })?;
            params.update();

            let nominal = params.inhib.act_avg.nominal;
            layers.push(Layer {
                name: spec.name.clone(),
                index: li,
                kind: spec.kind,
                n_neurons: shape.n_units(),
                n_pools: 1 + shape.n_sub_pools(),
                shape,
                neur_st: 0,
                pool_st: 0,
                params,
                vals: vec![LayerVals::new(nominal); self.n_data],
                lay_inhib: Vec::new(),
                recv_conns: Vec::new(),
                send_conns: Vec::new(),
            });
        }

        for (owner, sources) in &self.lay_inhib {
            let &li = names.get(owner).ok_or_else(|| NetError::LayerNotFound(owner.clone()))?;
            for src in sources {
                let &oi = names.get(src).ok_or_else(|| NetError::MissingReference {
                    owner: owner.clone(),
                    reference: src.clone(),
                })?;
                if oi == li {
                    return Err(NetError::InvalidParameter(format!(
                        "layer {} lists itself as an inhibition source",
                        owner
                    )));
                }
                if !layers[li].lay_inhib.contains(&oi) {
                    layers[li].lay_inhib.push(oi);
                }
            }
            if layers[li].lay_inhib.len() > MAX_LAY_INHIB {
                return Err(NetError::InvalidParameter(format!(
                    "layer {}: {} inhibition sources exceed the limit of {}",
                    owner,
                    layers[li].lay_inhib.len(),
                    MAX_LAY_INHIB
                )));
            }
        }
        Ok((layers, names))
    }

    fn connection_descriptor(
        &self,
        ci: usize,
        spec: &ConnSpec,
        layers: &[Layer],
        names: &ahash::AHashMap<String, usize>,
    ) -> Result<(Connection, Vec<(u32, u32)>)> {
        let name = format!("{}To{}", spec.send, spec.recv);
        let lookup = |layer: &str| {
            names.get(layer).copied().ok_or_else(|| NetError::MissingReference {
                owner: name.clone(),
                reference: layer.to_string(),
            })
        };
        let send = lookup(&spec.send)?;
        let recv = lookup(&spec.recv)?;

        let mut params = spec.params.clone();
        params
            .validate()
            .map_err(|e| NetError::InvalidParameter(format!("connection {}: {}", name, e)))?;
        params.update();

        let pairs = spec.pattern.connect(
            &name,
            &layers[send].shape,
            &layers[recv].shape,
            send == recv,
        )?;
        let n_recv = layers[recv].n_neurons;
        let conn = Connection {
            name,
            index: ci,
            send,
            recv,
            pattern: spec.pattern.clone(),
            params,
            syn_st: 0,
            n_syns: 0,
            send_con: Vec::new(),
            recv_con: Vec::new(),
            recv_syn_idx: Vec::new(),
            gbuf: GBuf::new(n_recv, 1, self.n_data),
            gscale: 0.0,
        };
        Ok((conn, pairs))
    }
}

fn lay_out_layer(lay: &mut Layer, neurons: &mut NeuronArray, pools: &mut PoolArray) {
    let st = neurons.extend(lay.n_neurons, lay.index as u32);
    let ed = st + lay.n_neurons;
    lay.neur_st = st;
    lay.pool_st = pools.push(st as u32, ed as u32, lay.index as u32, true);

    if !lay.shape.is_4d() {
        neurons.sub_pool[st..ed].fill(lay.pool_st as u32);
        return;
    }
    let size = lay.shape.pool_size();
    for sp in 0..lay.shape.n_sub_pools() {
        let ps = st + sp * size;
        let pi = pools.push(ps as u32, (ps + size) as u32, lay.index as u32, false);
        neurons.sub_pool[ps..ps + size].fill(pi as u32);
    }
}

/// Sets each connection's conductance scale. `rel` is normalized over all
/// connections of the same kind into the same receiver.
fn set_gscales(layers: &[Layer], conns: &mut [Connection]) {
    let mut sum_rel = vec![[0.0f32; 2]; layers.len()];
    for conn in conns.iter() {
        sum_rel[conn.recv][kind_slot(conn.kind())] += conn.params.scale.rel;
    }
    for conn in conns.iter_mut() {
        if conn.n_syns == 0 {
            conn.gscale = 0.0;
            continue;
        }
        let send = &layers[conn.send];
        let recv = &layers[conn.recv];
        let ncon = conn.n_syns as f32 / recv.n_neurons as f32;
        conn.gscale = conn.params.scale.gscale(
            send.nominal_act(),
            send.n_neurons as f32,
            ncon,
            sum_rel[conn.recv][kind_slot(conn.kind())],
        );
    }
}

fn kind_slot(kind: ConnectionKind) -> usize {
    match kind {
        ConnectionKind::Excitatory => 0,
        ConnectionKind::Inhibitory => 1,
    }
}
