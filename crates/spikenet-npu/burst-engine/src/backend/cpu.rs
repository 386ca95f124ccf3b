// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CPU Backend
//!
//! Rows are split into contiguous chunks and handed to a dedicated rayon
//! pool. Chunks are sized so each worker gets a few of them, which keeps
//! stealing possible without paying per-row task overhead.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use spikenet_npu_neural::{NetError, Result};
use spikenet_npu_runtime::{ComputeBackend, IndexKernel, RowKernel};

/// Lower bound on rows per rayon task
const MIN_ROWS_PER_TASK: usize = 64;

/// Chunks per worker, for load balancing
const CHUNKS_PER_WORKER: usize = 4;

pub struct CPUBackend {
    /// Backend name for logging
    name: String,
    pool: ThreadPool,
    workers: usize,
}

impl CPUBackend {
    /// Creates a backend with its own pool of `workers` threads
    /// (0 = one per available core)
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("spikenet-cpu-{}", i))
            .build()
            .map_err(|e| NetError::ComputationError(format!("CPU worker pool: {}", e)))?;
        let workers = pool.current_num_threads();
        Ok(Self {
            name: format!("CPU (rayon x{})", workers),
            pool,
            workers,
        })
    }

    #[inline]
    fn rows_per_task(&self, rows: usize) -> usize {
        (rows / (self.workers * CHUNKS_PER_WORKER).max(1)).max(MIN_ROWS_PER_TASK)
    }
}

impl std::fmt::Debug for CPUBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CPUBackend")
            .field("workers", &self.workers)
            .finish()
    }
}

impl ComputeBackend for CPUBackend {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn workers(&self) -> usize {
        self.workers
    }

    fn for_each_row(&self, data: &mut [f32], stride: usize, kernel: &RowKernel<'_>) {
        if stride == 0 || data.is_empty() {
            return;
        }
        let per_task = self.rows_per_task(data.len() / stride);
        self.pool.install(|| {
            data.par_chunks_mut(per_task * stride)
                .enumerate()
                .for_each(|(c, chunk)| {
                    let base = c * per_task;
                    for (j, row) in chunk.chunks_exact_mut(stride).enumerate() {
                        kernel(base + j, row);
                    }
                });
        });
    }

    fn for_each_index(&self, n: usize, kernel: &IndexKernel<'_>) {
        if n == 0 {
            return;
        }
        let per_task = self.rows_per_task(n);
        self.pool.install(|| {
            (0..n)
                .into_par_iter()
                .with_min_len(per_task)
                .for_each(|i| kernel(i));
        });
    }
}
