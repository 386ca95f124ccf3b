// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # External Input
//!
//! Maps a 1D, 2D or 4D pattern onto a layer's flat neuron range:
//!
//! | Pattern | Layer | Mapping |
//! |---------|-------|---------|
//! | 2D | 2D | by coordinate, clipped to the overlap |
//! | 2D | 4D | `(y, x)` → pool `(y / uy, x / ux)`, unit `(y % uy, x % ux)` |
//! | 4D | 4D | by coordinate, clipped to the overlap |
//! | anything else | any | flat, first `min(len, n)` values |
//!
//! Input and hidden layers receive the pattern as `Ext`; target layers
//! receive it as `Target` and are clamped to it in the plus phase.

use spikenet_npu_neural::{NetError, NeuronVar, Result};
use spikenet_npu_runtime::{flags, LayerShape};

use crate::network::Network;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtPattern {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl ExtPattern {
    /// Pattern with an explicit shape; the value count must match
    pub fn new(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != values.len() {
            return Err(NetError::ArraySizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            values,
        })
    }

    /// 1D pattern
    pub fn flat(values: Vec<f32>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// `(layer-local neuron index, value)` pairs for a layer of shape `lay`
    pub fn map_onto(&self, lay: &LayerShape) -> Vec<(usize, f32)> {
        let ld = lay.dims();
        let p = &self.shape;
        let mut out = Vec::with_capacity(self.values.len().min(lay.n_units()));
        match (p.len(), ld.len()) {
            (2, 2) => {
                for y in 0..p[0].min(ld[0]) {
                    for x in 0..p[1].min(ld[1]) {
                        out.push((y * ld[1] + x, self.values[y * p[1] + x]));
                    }
                }
            }
            (2, 4) => {
                let (uy, ux) = (ld[2], ld[3]);
                for y in 0..p[0] {
                    for x in 0..p[1] {
                        let (py, px) = (y / uy, x / ux);
                        if py >= ld[0] || px >= ld[1] {
                            continue;
                        }
                        let ni = lay.index_4d(py, px, y % uy, x % ux);
                        out.push((ni, self.values[y * p[1] + x]));
                    }
                }
            }
            (4, 4) => {
                for py in 0..p[0].min(ld[0]) {
                    for px in 0..p[1].min(ld[1]) {
                        for uy in 0..p[2].min(ld[2]) {
                            for ux in 0..p[3].min(ld[3]) {
                                let pi = ((py * p[1] + px) * p[2] + uy) * p[3] + ux;
                                out.push((lay.index_4d(py, px, uy, ux), self.values[pi]));
                            }
                        }
                    }
                }
            }
            _ => {
                let n = self.values.len().min(lay.n_units());
                out.extend(self.values[..n].iter().copied().enumerate());
            }
        }
        out
    }
}

impl Network {
    /// Applies a pattern to one layer in lane `di`, replacing whatever that
    /// layer-lane held before
    pub fn apply_ext(&mut self, layer: &str, di: usize, pattern: &ExtPattern) -> Result<()> {
        let li = self.layer_index(layer)?;
        if di >= self.n_data() {
            return Err(NetError::InvalidParameter(format!(
                "data lane {} out of range (n_data {})",
                di,
                self.n_data()
            )));
        }
        let lay = &self.layers[li];
        let (var, flag) = if lay.is_target() {
            (NeuronVar::Target, flags::HAS_TARG)
        } else {
            (NeuronVar::Ext, flags::HAS_EXT)
        };
        let st = lay.neur_st;
        for ni in lay.neurons() {
            self.neurons.set(ni, di, var, 0.0);
            self.neurons.clear_flag(ni, di, flag);
            // Ext on a target layer is the previous plus-phase clamp
            if lay.is_target() {
                self.neurons.set(ni, di, NeuronVar::Ext, 0.0);
                self.neurons.clear_flag(ni, di, flags::HAS_EXT);
            }
        }
        for (k, v) in pattern.map_onto(&lay.shape) {
            self.neurons.set(st + k, di, var, v);
            self.neurons.set_flag(st + k, di, flag);
        }
        Ok(())
    }

    /// Applies one pattern per lane; lanes beyond `patterns.len()` are untouched
    pub fn apply_ext_lanes(&mut self, layer: &str, patterns: &[ExtPattern]) -> Result<()> {
        for (di, p) in patterns.iter().enumerate().take(self.n_data()) {
            self.apply_ext(layer, di, p)?;
        }
        Ok(())
    }
}
