// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Layer geometry
//!
//! 1D `[n]`, 2D `[y, x]` or 4D `[pool_y, pool_x, unit_y, unit_x]`. 4D shapes
//! are flattened row-major, so each sub-pool's neurons are contiguous.

use serde::{Deserialize, Serialize};
use spikenet_npu_neural::{NetError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerShape {
    dims: Vec<usize>,
}

impl LayerShape {
    /// Validates rank and sizes; `layer` names the owner in errors
    pub fn new(layer: &str, dims: &[usize]) -> Result<Self> {
        if dims.is_empty() || dims.iter().any(|&d| d == 0) {
            return Err(NetError::ZeroSizedLayer(layer.to_string()));
        }
        if !matches!(dims.len(), 1 | 2 | 4) {
            return Err(NetError::InvalidShape {
                layer: layer.to_string(),
                shape: dims.to_vec(),
            });
        }
        Ok(Self { dims: dims.to_vec() })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn n_units(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_4d(&self) -> bool {
        self.dims.len() == 4
    }

    /// Sub-pool count (0 unless 4D)
    pub fn n_sub_pools(&self) -> usize {
        if self.is_4d() {
            self.dims[0] * self.dims[1]
        } else {
            0
        }
    }

    /// Neurons per sub-pool (whole layer unless 4D)
    pub fn pool_size(&self) -> usize {
        if self.is_4d() {
            self.dims[2] * self.dims[3]
        } else {
            self.n_units()
        }
    }

    /// Flat index of a 4D coordinate
    #[inline]
    pub fn index_4d(&self, py: usize, px: usize, uy: usize, ux: usize) -> usize {
        ((py * self.dims[1] + px) * self.dims[2] + uy) * self.dims[3] + ux
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_shapes() {
        let s = LayerShape::new("a", &[5, 5]).unwrap();
        assert_eq!(s.n_units(), 25);
        assert_eq!(s.n_sub_pools(), 0);
        assert_eq!(s.pool_size(), 25);

        let s = LayerShape::new("b", &[2, 3, 4, 5]).unwrap();
        assert_eq!(s.n_units(), 120);
        assert_eq!(s.n_sub_pools(), 6);
        assert_eq!(s.pool_size(), 20);
        assert_eq!(s.index_4d(1, 2, 3, 4), 119);
        assert_eq!(s.index_4d(0, 1, 0, 0), 20);
    }

    #[test]
    fn test_zero_sized_is_fatal() {
        assert_eq!(
            LayerShape::new("z", &[5, 0]),
            Err(NetError::ZeroSizedLayer("z".to_string()))
        );
        assert!(matches!(
            LayerShape::new("z", &[]),
            Err(NetError::ZeroSizedLayer(_))
        ));
    }

    #[test]
    fn test_rank_three_rejected() {
        assert!(matches!(
            LayerShape::new("r", &[2, 2, 2]),
            Err(NetError::InvalidShape { .. })
        ));
    }
}
