// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Compute Backend Abstraction
//!
//! Every per-cycle computation is written once as a kernel over a single
//! row (or a single index) and dispatched through [`ComputeBackend`]. A
//! backend decides how rows are spread over workers; it never changes what a
//! kernel computes. Because rows are disjoint and every cross-row reduction is
//! done sequentially inside one kernel invocation, results are bit-identical
//! for any worker count and any backend.

/// Kernel over one mutable row: `(row_index, row)`
pub type RowKernel<'a> = dyn Fn(usize, &mut [f32]) + Sync + 'a;

/// Kernel over one index with no owned output row
pub type IndexKernel<'a> = dyn Fn(usize) + Sync + 'a;

/// Data-parallel dispatch over index ranges
pub trait ComputeBackend: Send + Sync {
    /// Backend name for logs and benchmarks
    fn backend_name(&self) -> &str;

    /// Number of concurrent workers
    fn workers(&self) -> usize;

    /// Runs `kernel` on every `stride`-wide row of `data`.
    ///
    /// `data.len()` must be a multiple of `stride`. Each row is visited
    /// exactly once. The call returns only after every row completed, which
    /// is the barrier between phases.
    fn for_each_row(&self, data: &mut [f32], stride: usize, kernel: &RowKernel<'_>);

    /// Runs `kernel` for every index in `0..n`, returning after all completed.
    ///
    /// Kernels dispatched this way may only write through atomics.
    fn for_each_index(&self, n: usize, kernel: &IndexKernel<'_>);
}

/// Single-threaded reference backend
#[derive(Debug, Clone, Default)]
pub struct SerialBackend;

impl SerialBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for SerialBackend {
    fn backend_name(&self) -> &str {
        "serial"
    }

    fn workers(&self) -> usize {
        1
    }

    fn for_each_row(&self, data: &mut [f32], stride: usize, kernel: &RowKernel<'_>) {
        if stride == 0 {
            return;
        }
        for (i, row) in data.chunks_exact_mut(stride).enumerate() {
            kernel(i, row);
        }
    }

    fn for_each_index(&self, n: usize, kernel: &IndexKernel<'_>) {
        for i in 0..n {
            kernel(i);
        }
    }
}
