// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Backend
//!
//! CPU emulation of compute-shader workgroup dispatch. Nothing runs on a
//! GPU; the compute units are host threads. The index space is cut into
//! fixed-size workgroups and a fixed set of compute units pull workgroup ids
//! from a shared atomic counter until none remain. Each kernel invocation
//! receives its global id (`workgroup * workgroup_size + local`), exactly as
//! the row index it would get on any other backend.
//!
//! Compute units are scoped threads, so a dispatch returns only after every
//! workgroup completed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use spikenet_npu_neural::{NetError, Result};
use spikenet_npu_runtime::{ComputeBackend, IndexKernel, RowKernel};

/// Workgroup dispatch over scoped host threads (no GPU execution)
#[derive(Debug)]
pub struct KernelBackend {
    name: String,
    compute_units: usize,
    workgroup_size: usize,
}

impl KernelBackend {
    /// `compute_units` of 0 uses the available parallelism
    pub fn new(compute_units: usize, workgroup_size: usize) -> Result<Self> {
        if workgroup_size == 0 {
            return Err(NetError::InvalidBackend(
                "kernel workgroup size must be positive".to_string(),
            ));
        }
        let compute_units = if compute_units == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            compute_units
        };
        Ok(Self {
            name: format!("Kernel (CPU, {} units x {})", compute_units, workgroup_size),
            compute_units,
            workgroup_size,
        })
    }

    pub fn workgroup_size(&self) -> usize {
        self.workgroup_size
    }
}

impl ComputeBackend for KernelBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn workers(&self) -> usize {
        self.compute_units
    }

    fn for_each_row(&self, data: &mut [f32], stride: usize, kernel: &RowKernel<'_>) {
        if stride == 0 || data.is_empty() {
            return;
        }
        let wg = self.workgroup_size;
        // each workgroup is claimed by exactly one unit, so its lock is never contended
        let groups: Vec<Mutex<&mut [f32]>> = data.chunks_mut(wg * stride).map(Mutex::new).collect();
        let units = self.compute_units.min(groups.len());
        let next = AtomicUsize::new(0);

        let run_unit = || loop {
            let g = next.fetch_add(1, Ordering::Relaxed);
            if g >= groups.len() {
                break;
            }
            let mut chunk = match groups[g].lock() {
                Ok(c) => c,
                Err(poisoned) => poisoned.into_inner(),
            };
            for (local, row) in chunk.chunks_exact_mut(stride).enumerate() {
                kernel(g * wg + local, row);
            }
        };

        if units <= 1 {
            run_unit();
            return;
        }
        std::thread::scope(|s| {
            for _ in 0..units {
                s.spawn(run_unit);
            }
        });
    }

    fn for_each_index(&self, n: usize, kernel: &IndexKernel<'_>) {
        if n == 0 {
            return;
        }
        let wg = self.workgroup_size;
        let n_groups = n.div_ceil(wg);
        let units = self.compute_units.min(n_groups);
        let next = AtomicUsize::new(0);

        let run_unit = || loop {
            let g = next.fetch_add(1, Ordering::Relaxed);
            if g >= n_groups {
                break;
            }
            for i in g * wg..((g + 1) * wg).min(n) {
                kernel(i);
            }
        };

        if units <= 1 {
            run_unit();
            return;
        }
        std::thread::scope(|s| {
            for _ in 0..units {
                s.spawn(run_unit);
            }
        });
    }
}
