// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connectivity patterns
//!
//! A pattern expands a (sending shape, receiving shape) pair into the list
//! of (sender, receiver) local index pairs, ordered by sender and then by
//! receiver. That order is the synapse storage order.

use serde::{Deserialize, Serialize};
use spikenet_npu_neural::{NetError, Result};

use crate::shape::LayerShape;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    /// Every sender to every receiver. `self_con` keeps i -> i synapses
    /// when sender and receiver are the same layer.
    Full {
        #[serde(default)]
        self_con: bool,
    },
    /// Sender i to receiver i; sizes must match
    OneToOne,
    /// Full connectivity between corresponding sub-pools of two 4D layers
    PoolOneToOne,
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Full { self_con: false }
    }
}

impl Pattern {
    /// Expands the pattern. `name` labels the connection in errors.
    pub fn connect(
        &self,
        name: &str,
        send: &LayerShape,
        recv: &LayerShape,
        same_layer: bool,
    ) -> Result<Vec<(u32, u32)>> {
        let ns = send.n_units();
        let nr = recv.n_units();
        let malformed = |reason: String| NetError::MalformedPattern {
            connection: name.to_string(),
            reason,
        };
        let mut pairs = Vec::new();
        match self {
            Pattern::Full { self_con } => {
                pairs.reserve(ns * nr);
                for s in 0..ns {
                    for r in 0..nr {
                        if same_layer && !self_con && s == r {
                            continue;
                        }
                        pairs.push((s as u32, r as u32));
                    }
                }
            }
            Pattern::OneToOne => {
                if ns != nr {
                    return Err(malformed(format!(
                        "one-to-one needs equal sizes, got {} -> {}",
                        ns, nr
                    )));
                }
                pairs.extend((0..ns as u32).map(|i| (i, i)));
            }
            Pattern::PoolOneToOne => {
                if !send.is_4d() || !recv.is_4d() {
                    return Err(malformed("pool one-to-one needs two 4D layers".to_string()));
                }
                if send.n_sub_pools() != recv.n_sub_pools() {
                    return Err(malformed(format!(
                        "pool counts differ: {} -> {}",
                        send.n_sub_pools(),
                        recv.n_sub_pools()
                    )));
                }
                let sps = send.pool_size();
                let rps = recv.pool_size();
                pairs.reserve(ns * rps);
                for s in 0..ns {
                    let p = s / sps;
                    for r in p * rps..(p + 1) * rps {
                        pairs.push((s as u32, r as u32));
                    }
                }
            }
        }
        if pairs.is_empty() {
            return Err(malformed("pattern produces no synapses".to_string()));
        }
        Ok(pairs)
    }
}
