// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Weight Snapshots
//!
//! Human-readable JSON snapshots of learned state, organized by receiving
//! layer:
//!
//! ```text
//! NetworkWeights
//! └── LayerWeights          meta {ActMAvg, ActPAvg, GiMult}, units {ActAvg[], TrgAvg[]}
//!     └── ConnectionWeights from -> this layer
//!         └── SynapseWeights {si, ri, wt, lwt, swt}   (layer-local indices)
//! ```
//!
//! Layer meta is taken from lane 0 and restored to every lane. Reading a
//! layer recomputes AvgDif from the restored averages.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use spikenet_npu_neural::{NetError, NeuronAvgVar, Result, SynapseVar};
use tracing::info;

use crate::network::Network;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkWeights {
    pub network: String,
    pub layers: Vec<LayerWeights>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub layer: String,
    pub meta: LayerMeta,
    pub units: UnitWeights,
    /// Connections received by this layer
    #[serde(default)]
    pub connections: Vec<ConnectionWeights>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerMeta {
    #[serde(rename = "ActMAvg")]
    pub act_m_avg: f32,
    #[serde(rename = "ActPAvg")]
    pub act_p_avg: f32,
    #[serde(rename = "GiMult")]
    pub gi_mult: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitWeights {
    #[serde(rename = "ActAvg")]
    pub act_avg: Vec<f32>,
    #[serde(rename = "TrgAvg")]
    pub trg_avg: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionWeights {
    pub from: String,
    pub to: String,
    pub synapses: Vec<SynapseWeights>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynapseWeights {
    /// Sending neuron, local to the sending layer
    pub si: u32,
    /// Receiving neuron, local to the receiving layer
    pub ri: u32,
    pub wt: f32,
    pub lwt: f32,
    pub swt: f32,
}

fn mismatch(msg: String) -> NetError {
    NetError::WeightFileMismatch(msg)
}

impl NetworkWeights {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| NetError::SerializationError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| NetError::SerializationError(e.to_string()))
    }
}

impl Network {
    // ═══════════════════════════════════════════════════════════
    // Write hooks
    // ═══════════════════════════════════════════════════════════

    pub fn layer_weights(&self, layer: &str) -> Result<LayerWeights> {
        let li = self.layer_index(layer)?;
        let lay = &self.layers[li];
        let vals = lay.vals[0];
        let units = UnitWeights {
            act_avg: lay
                .neurons()
                .map(|ni| self.neurons.get_avg(ni, NeuronAvgVar::ActAvg))
                .collect(),
            trg_avg: lay
                .neurons()
                .map(|ni| self.neurons.get_avg(ni, NeuronAvgVar::TrgAvg))
                .collect(),
        };
        let connections = lay
            .recv_conns
            .iter()
            .map(|&ci| self.connection_weights(ci))
            .collect();
        Ok(LayerWeights {
            layer: lay.name.clone(),
            meta: LayerMeta {
                act_m_avg: vals.act_m_avg,
                act_p_avg: vals.act_p_avg,
                gi_mult: vals.gi_mult,
            },
            units,
            connections,
        })
    }

    /// Snapshot of one connection, in synapse storage order
    pub fn connection_weights(&self, ci: usize) -> ConnectionWeights {
        let conn = &self.conns[ci];
        let send = &self.layers[conn.send];
        let recv = &self.layers[conn.recv];
        let synapses = conn
            .synapses()
            .map(|si| SynapseWeights {
                si: self.synapses.send[si] - send.neur_st as u32,
                ri: self.synapses.recv[si] - recv.neur_st as u32,
                wt: self.synapses.get(si, SynapseVar::Wt),
                lwt: self.synapses.get(si, SynapseVar::LWt),
                swt: self.synapses.get(si, SynapseVar::SWt),
            })
            .collect();
        ConnectionWeights {
            from: send.name.clone(),
            to: recv.name.clone(),
            synapses,
        }
    }

    pub fn weights(&self) -> NetworkWeights {
        NetworkWeights {
            network: self.name.clone(),
            layers: self
                .layers
                .iter()
                .filter_map(|l| self.layer_weights(&l.name).ok())
                .collect(),
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Read hooks
    // ═══════════════════════════════════════════════════════════

    /// Restores layer meta, unit averages and every listed connection,
    /// then recomputes AvgDif
    pub fn apply_layer_weights(&mut self, lw: &LayerWeights) -> Result<()> {
        let li = self
            .layer_index(&lw.layer)
            .map_err(|_| mismatch(format!("unknown layer '{}'", lw.layer)))?;
        let n = self.layers[li].n_neurons;
        if lw.units.act_avg.len() != n || lw.units.trg_avg.len() != n {
            return Err(mismatch(format!(
                "layer '{}' has {} neurons, snapshot has {} ActAvg / {} TrgAvg",
                lw.layer,
                n,
                lw.units.act_avg.len(),
                lw.units.trg_avg.len()
            )));
        }

        // resolve every connection before mutating anything
        let mut targets = Vec::with_capacity(lw.connections.len());
        for cw in &lw.connections {
            if cw.to != lw.layer {
                return Err(mismatch(format!(
                    "connection {} -> {} listed under layer '{}'",
                    cw.from, cw.to, lw.layer
                )));
            }
            targets.push(self.resolve_connection(cw)?);
        }

        let lay = &mut self.layers[li];
        for v in lay.vals.iter_mut() {
            v.act_m_avg = lw.meta.act_m_avg;
            v.act_p_avg = lw.meta.act_p_avg;
            v.gi_mult = lw.meta.gi_mult;
        }
        let st = lay.neur_st;
        for k in 0..n {
            self.neurons.set_avg(st + k, NeuronAvgVar::ActAvg, lw.units.act_avg[k]);
            self.neurons.set_avg(st + k, NeuronAvgVar::TrgAvg, lw.units.trg_avg[k]);
        }
        for t in &targets {
            self.write_synapses(t);
        }
        spikenet_npu_plasticity::avg_dif_from_trg_avg(
            &self.layers[li],
            &mut self.neurons,
            self.backend.as_ref(),
        );
        Ok(())
    }

    /// Restores a single connection's synapse weights
    pub fn apply_connection_weights(&mut self, cw: &ConnectionWeights) -> Result<()> {
        let targets = self.resolve_connection(cw)?;
        self.write_synapses(&targets);
        Ok(())
    }

    /// Applies every layer record in order, stopping at the first mismatch
    pub fn apply_weights(&mut self, nw: &NetworkWeights) -> Result<()> {
        for lw in &nw.layers {
            self.apply_layer_weights(lw)?;
        }
        info!(
            network = %self.name,
            layers = nw.layers.len(),
            "[NETWORK] weights applied"
        );
        Ok(())
    }

    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .map_err(|e| NetError::SerializationError(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.weights())
            .map_err(|e| NetError::SerializationError(e.to_string()))?;
        info!(path = %path.as_ref().display(), "[NETWORK] weights saved");
        Ok(())
    }

    pub fn load_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file =
            File::open(path.as_ref()).map_err(|e| NetError::SerializationError(e.to_string()))?;
        let nw: NetworkWeights = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| NetError::SerializationError(e.to_string()))?;
        self.apply_weights(&nw)
    }

    /// Maps each record to its absolute synapse index
    fn resolve_connection(&self, cw: &ConnectionWeights) -> Result<Vec<(usize, SynapseWeights)>> {
        let conn = self
            .conns
            .iter()
            .find(|c| self.layers[c.send].name == cw.from && self.layers[c.recv].name == cw.to)
            .ok_or_else(|| mismatch(format!("unknown connection {} -> {}", cw.from, cw.to)))?;
        let recv_st = self.layers[conn.recv].neur_st as u32;
        let mut out = Vec::with_capacity(cw.synapses.len());
        for sw in &cw.synapses {
            let si = conn
                .send_con
                .get(sw.si as usize)
                .and_then(|run| {
                    run.range()
                        .find(|&si| self.synapses.recv[si] == recv_st + sw.ri)
                })
                .ok_or_else(|| {
                    mismatch(format!(
                        "{}: no synapse from {} to {}",
                        conn.name, sw.si, sw.ri
                    ))
                })?;
            out.push((si, *sw));
        }
        Ok(out)
    }

    fn write_synapses(&mut self, targets: &[(usize, SynapseWeights)]) {
        for &(si, sw) in targets {
            self.synapses.set(si, SynapseVar::Wt, sw.wt);
            self.synapses.set(si, SynapseVar::LWt, sw.lwt);
            self.synapses.set(si, SynapseVar::SWt, sw.swt);
            self.synapses.set(si, SynapseVar::DWt, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::NetworkBuilder;
    use spikenet_npu_runtime::{LayerKind, Pattern};

    fn net(seed: u64) -> Network {
        NetworkBuilder::new("w")
            .seed(seed)
            .layer("In", &[3], LayerKind::Input)
            .layer("Hid", &[2], LayerKind::Hidden)
            .connect("In", "Hid", Pattern::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_snapshot_shape() {
        let n = net(1);
        let w = n.weights();
        assert_eq!(w.layers.len(), 2);
        assert!(w.layers[0].connections.is_empty());
        let cw = &w.layers[1].connections[0];
        assert_eq!((cw.from.as_str(), cw.to.as_str()), ("In", "Hid"));
        assert_eq!(cw.synapses.len(), 6);
        assert_eq!((cw.synapses[1].si, cw.synapses[1].ri), (0, 1));
        assert_eq!((cw.synapses[2].si, cw.synapses[2].ri), (1, 0));
    }

    #[test]
    fn test_json_field_names() {
        let json = net(1).weights().to_json().unwrap();
        assert!(json.contains("\"ActMAvg\""));
        assert!(json.contains("\"TrgAvg\""));
        assert!(json.contains("\"lwt\""));
    }

    #[test]
    fn test_apply_restores_other_network() {
        let src = net(1);
        let mut dst = net(2);
        assert_ne!(
            src.conn_weights(0, SynapseVar::Wt),
            dst.conn_weights(0, SynapseVar::Wt)
        );
        let snap = NetworkWeights::from_json(&src.weights().to_json().unwrap()).unwrap();
        dst.apply_weights(&snap).unwrap();
        for var in [SynapseVar::Wt, SynapseVar::LWt, SynapseVar::SWt] {
            assert_eq!(src.conn_weights(0, var), dst.conn_weights(0, var));
        }
        assert_eq!(
            src.neurons.get_avg(3, NeuronAvgVar::TrgAvg),
            dst.neurons.get_avg(3, NeuronAvgVar::TrgAvg)
        );
    }

    #[test]
    fn test_mismatch_rejected() {
        let mut n = net(1);
        let mut w = n.weights();
        w.layers[1].connections[0].synapses[0].ri = 9;
        assert!(matches!(
            n.apply_weights(&w),
            Err(NetError::WeightFileMismatch(_))
        ));

        let mut w = n.weights();
        w.layers[0].layer = "Ghost".to_string();
        assert!(matches!(
            n.apply_weights(&w),
            Err(NetError::WeightFileMismatch(_))
        ));

        let mut w = n.weights();
        w.layers[1].units.act_avg.pop();
        assert!(matches!(
            n.apply_layer_weights(&w.layers[1]),
            Err(NetError::WeightFileMismatch(_))
        ));
    }
}
