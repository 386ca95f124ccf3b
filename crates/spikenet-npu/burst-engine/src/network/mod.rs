// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Network
//!
//! Owns the arenas, the layer and connection descriptors, the simulation
//! [`Context`] and the active [`ComputeBackend`]. Construction goes through
//! [`NetworkBuilder`](crate::builder::NetworkBuilder).
//!
//! Method groups:
//! - cycle execution and backend switching (this module)
//! - trial-level phase bookkeeping ([`phase`])
//! - end-of-trial and slow learning passes ([`learn`])

mod learn;
mod phase;

use ahash::AHashMap;
use spikenet_npu_neural::{
    Context, NetError, NeuronAvgVar, NeuronVar, PoolVar, Result, SynapseVar, VarRow,
};
use spikenet_npu_runtime::{
    flags, ComputeBackend, Connection, Layer, NeuronArray, PoolArray, SynapseArray,
};
use tracing::info;

use crate::phases::Topology;
use crate::scheduler::{CycleProfile, CycleScheduler, CycleState};

pub struct Network {
    pub name: String,
    pub ctx: Context,
    pub layers: Vec<Layer>,
    pub conns: Vec<Connection>,
    pub neurons: NeuronArray,
    pub synapses: SynapseArray,
    pub pools: PoolArray,

    /// Cycles at the end of each trial spent in the plus phase
    pub plus_cycles: i32,

    /// Seed for weight initialization and synaptic failure draws
    pub seed: u64,

    layer_names: AHashMap<String, usize>,
    pub(crate) backend: Box<dyn ComputeBackend>,
    scheduler: CycleScheduler,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("layers", &self.layers.len())
            .field("connections", &self.conns.len())
            .field("neurons", &self.neurons.n_neurons)
            .field("synapses", &self.synapses.n_syns)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl Network {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: String,
        ctx: Context,
        layers: Vec<Layer>,
        conns: Vec<Connection>,
        neurons: NeuronArray,
        synapses: SynapseArray,
        pools: PoolArray,
        plus_cycles: i32,
        seed: u64,
        backend: Box<dyn ComputeBackend>,
    ) -> Self {
        let layer_names = layers
            .iter()
            .map(|l| (l.name.clone(), l.index))
            .collect();
        Self {
            name,
            ctx,
            layers,
            conns,
            neurons,
            synapses,
            pools,
            plus_cycles,
            seed,
            layer_names,
            backend,
            scheduler: CycleScheduler::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Cycle execution
    // ═══════════════════════════════════════════════════════════

    /// Runs one cycle through all five phases
    pub fn cycle(&mut self) -> Result<CycleProfile> {
        let st = CycleState {
            ctx: &mut self.ctx,
            topo: Topology {
                layers: &self.layers,
                conns: &self.conns,
            },
            nrns: &mut self.neurons,
            syns: &mut self.synapses,
            pools: &mut self.pools,
        };
        self.scheduler.run_cycle(st, self.backend.as_ref())
    }

    /// Runs `n` cycles, stopping at the first error
    pub fn cycles(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.cycle()?;
        }
        Ok(())
    }

    /// Profile of the most recent cycle
    pub fn last_profile(&self) -> CycleProfile {
        self.scheduler.last_profile()
    }

    /// Swaps the compute backend. Takes effect on the next dispatch.
    pub fn set_backend(&mut self, backend: Box<dyn ComputeBackend>) {
        info!(
            "[NETWORK] {}: backend {} -> {}",
            self.name,
            self.backend.backend_name(),
            backend.backend_name()
        );
        self.backend = backend;
    }

    /// Cycles slower than `threshold` are logged at warn level
    pub fn set_slow_cycle_threshold(&mut self, threshold: std::time::Duration) {
        self.scheduler = self.scheduler.clone().with_slow_cycle(threshold);
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    // ═══════════════════════════════════════════════════════════
    // Lookups
    // ═══════════════════════════════════════════════════════════

    pub fn n_neurons(&self) -> usize {
        self.neurons.n_neurons
    }

    pub fn n_synapses(&self) -> usize {
        self.synapses.n_syns
    }

    pub fn n_data(&self) -> usize {
        self.neurons.n_data
    }

    /// Neurons spiking this cycle, summed over lanes
    pub fn spike_count(&self) -> u64 {
        self.neurons
            .vals
            .chunks_exact(NeuronVar::COUNT)
            .filter(|nrn| nrn[NeuronVar::Spike.index()] > 0.0)
            .count() as u64
    }

    pub fn layer_index(&self, name: &str) -> Result<usize> {
        self.layer_names
            .get(name)
            .copied()
            .ok_or_else(|| NetError::LayerNotFound(name.to_string()))
    }

    pub fn layer(&self, name: &str) -> Result<&Layer> {
        Ok(&self.layers[self.layer_index(name)?])
    }

    pub fn layer_mut(&mut self, name: &str) -> Result<&mut Layer> {
        let li = self.layer_index(name)?;
        Ok(&mut self.layers[li])
    }

    /// Connection from `send` to `recv`, if any
    pub fn connection(&self, send: &str, recv: &str) -> Option<&Connection> {
        let (s, r) = (self.layer_index(send).ok()?, self.layer_index(recv).ok()?);
        self.conns.iter().find(|c| c.send == s && c.recv == r)
    }

    /// Values of a named neuron variable (per-lane or lane-shared) for every
    /// neuron of a layer in lane `di`
    pub fn unit_values(&self, layer: &str, var: &str, di: usize) -> Result<Vec<f32>> {
        let lay = self.layer(layer)?;
        if di >= self.n_data() {
            return Err(NetError::InvalidParameter(format!(
                "data lane {} out of range (n_data {})",
                di,
                self.n_data()
            )));
        }
        if let Some(v) = NeuronVar::from_name(var) {
            return Ok(lay.neurons().map(|ni| self.neurons.get(ni, di, v)).collect());
        }
        if let Some(v) = NeuronAvgVar::from_name(var) {
            return Ok(lay.neurons().map(|ni| self.neurons.get_avg(ni, v)).collect());
        }
        Err(NetError::UnknownVariable(var.to_string()))
    }

    /// Neuron variable by raw indices; NaN when any index is out of range
    pub fn neuron_var_by_index(&self, ni: usize, di: usize, var_index: usize) -> f32 {
        self.neurons.get_by_index(ni, di, var_index)
    }

    /// Synapse variable by raw indices; NaN when any index is out of range
    pub fn syn_value_by_index(&self, si: usize, var_index: usize) -> f32 {
        self.synapses.get_by_index(si, var_index)
    }

    /// Pool variable by raw indices; NaN when any index is out of range
    pub fn pool_value(&self, pi: usize, di: usize, var_index: usize) -> f32 {
        self.pools.get_by_index(pi, di, var_index)
    }

    /// Synapse weights of a connection in storage order
    pub fn conn_weights(&self, ci: usize, var: SynapseVar) -> Vec<f32> {
        self.conns
            .get(ci)
            .map(|c| c.synapses().map(|si| self.synapses.get(si, var)).collect())
            .unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════
    // Initialization
    // ═══════════════════════════════════════════════════════════

    /// Clears external input and targets on every neuron and lane
    pub fn init_ext(&mut self) {
        let NeuronArray {
            vals,
            flags: nrn_flags,
            ..
        } = &mut self.neurons;
        for (nrn, f) in vals.chunks_exact_mut(NeuronVar::COUNT).zip(nrn_flags.iter_mut()) {
            nrn.set_var(NeuronVar::Ext, 0.0);
            nrn.set_var(NeuronVar::Target, 0.0);
            *f &= !(flags::HAS_EXT | flags::HAS_TARG);
        }
    }

    /// Resets all activation, pool and conductance-buffer state and the
    /// clock. Weights and homeostatic averages are kept.
    pub fn init_acts(&mut self) {
        self.ctx.reset();
        let n_data = self.neurons.n_data;
        let layers = &self.layers;
        let NeuronArray { vals, layer, .. } = &mut self.neurons;
        let layer: &[u32] = layer;
        self.backend
            .for_each_row(vals, NeuronVar::COUNT, &|r, nrn| {
                layers[layer[r / n_data] as usize].params.act.init_act_vars(nrn);
            });
        self.pools.vals.fill(0.0);
        self.synapses.init_ca();
        for conn in &self.conns {
            conn.gbuf.clear();
        }
        for lay in self.layers.iter_mut() {
            let nominal = lay.nominal_act();
            for vals in lay.vals.iter_mut() {
                vals.act_m_avg = nominal;
                vals.act_p_avg = nominal;
                vals.cor_sim = Default::default();
            }
        }
    }

    /// Turns a neuron off (or back on) in one lane. Off neurons are frozen
    /// and excluded from pool statistics.
    pub fn set_neuron_off(&mut self, ni: usize, di: usize, off: bool) -> Result<()> {
        if ni >= self.n_neurons() || di >= self.n_data() {
            return Err(NetError::InvalidParameter(format!(
                "neuron ({}, {}) out of range",
                ni, di
            )));
        }
        if off {
            self.neurons.set_flag(ni, di, flags::OFF);
        } else {
            self.neurons.clear_flag(ni, di, flags::OFF);
        }
        Ok(())
    }

    /// Pool value of a layer's whole-layer pool by name
    pub fn layer_pool_value(&self, layer: &str, di: usize, var: PoolVar) -> Result<f32> {
        let lay = self.layer(layer)?;
        Ok(self.pools.get_by_index(lay.pool_st, di, var.index()))
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::NetworkBuilder;
    use spikenet_npu_neural::{NetError, NeuronVar};
    use spikenet_npu_runtime::{LayerKind, Pattern};

    fn small() -> super::Network {
        NetworkBuilder::new("small")
            .n_data(2)
            .layer("In", &[3, 3], LayerKind::Input)
            .layer("Out", &[2, 2], LayerKind::Target)
            .connect("In", "Out", Pattern::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookups() {
        let net = small();
        assert_eq!(net.n_neurons(), 13);
        assert_eq!(net.n_synapses(), 36);
        assert_eq!(net.layer_index("Out").unwrap(), 1);
        assert!(matches!(net.layer("Nope"), Err(NetError::LayerNotFound(_))));
        assert!(net.connection("In", "Out").is_some());
        assert!(net.connection("Out", "In").is_none());
    }

    #[test]
    fn test_unit_values() {
        let net = small();
        let vm = net.unit_values("In", "Vm", 1).unwrap();
        assert_eq!(vm.len(), 9);
        assert!(vm.iter().all(|&v| v == 0.3));
        let trg = net.unit_values("Out", "TrgAvg", 0).unwrap();
        assert_eq!(trg.len(), 4);
        assert!(matches!(
            net.unit_values("In", "Bogus", 0),
            Err(NetError::UnknownVariable(_))
        ));
        assert!(net.unit_values("In", "Vm", 2).is_err());
    }

    #[test]
    fn test_index_lookups_return_nan() {
        let net = small();
        assert!(net.neuron_var_by_index(13, 0, 0).is_nan());
        assert!(net.neuron_var_by_index(0, 0, NeuronVar::COUNT).is_nan());
        assert!(net.syn_value_by_index(36, 0).is_nan());
        assert!(net.pool_value(2, 0, 0).is_nan());
        assert_eq!(net.neuron_var_by_index(0, 0, NeuronVar::Vm.index()), 0.3);
    }

    #[test]
    fn test_off_neuron_frozen() {
        let mut net = small();
        net.set_neuron_off(0, 0, true).unwrap();
        let before = net.neurons.row(0, 0).to_vec();
        net.cycles(5).unwrap();
        assert_eq!(net.neurons.row(0, 0), before.as_slice());
        assert!(net.set_neuron_off(99, 0, true).is_err());
    }

    #[test]
    fn test_init_acts_resets_clock() {
        let mut net = small();
        net.cycles(3).unwrap();
        assert_eq!(net.ctx.cycles_total, 3);
        net.init_acts();
        assert_eq!(net.ctx.cycles_total, 0);
        assert_eq!(net.neurons.get(4, 1, NeuronVar::Vm), 0.3);
    }
}
