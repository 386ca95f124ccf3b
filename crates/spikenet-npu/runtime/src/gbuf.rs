// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Delayed conductance ring buffer
//!
//! One buffer per connection, `capacity` slots per (receiving neuron, lane).
//! Senders accumulate fixed-point conductance with `fetch_add`; integer
//! addition is commutative, so the summed value is independent of the order
//! in which concurrent senders land. The receiver drains its slot exactly
//! once per cycle with `swap(0)`.

use std::sync::atomic::{AtomicI32, Ordering};

#[derive(Debug)]
pub struct GBuf {
    n_recv: usize,
    capacity: usize,
    n_data: usize,
    buf: Vec<AtomicI32>,
}

impl GBuf {
    pub fn new(n_recv: usize, capacity: usize, n_data: usize) -> Self {
        let capacity = capacity.max(1);
        let n_data = n_data.max(1);
        let len = n_recv * capacity * n_data;
        Self {
            n_recv,
            capacity,
            n_data,
            buf: (0..len).map(|_| AtomicI32::new(0)).collect(),
        }
    }

    #[inline(always)]
    fn idx(&self, ri: usize, slot: usize, di: usize) -> usize {
        (ri * self.capacity + slot) * self.n_data + di
    }

    /// Accumulates `v` into (receiver, slot, lane)
    #[inline]
    pub fn add(&self, ri: usize, slot: usize, di: usize, v: i32) {
        self.buf[self.idx(ri, slot, di)].fetch_add(v, Ordering::Relaxed);
    }

    /// Reads and clears (receiver, slot, lane)
    #[inline]
    pub fn take(&self, ri: usize, slot: usize, di: usize) -> i32 {
        self.buf[self.idx(ri, slot, di)].swap(0, Ordering::Relaxed)
    }

    /// Reads without clearing
    #[inline]
    pub fn peek(&self, ri: usize, slot: usize, di: usize) -> i32 {
        self.buf[self.idx(ri, slot, di)].load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        for v in &self.buf {
            v.store(0, Ordering::Relaxed);
        }
    }

    pub fn n_recv(&self) -> usize {
        self.n_recv
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Clone for GBuf {
    fn clone(&self) -> Self {
        Self {
            n_recv: self.n_recv,
            capacity: self.capacity,
            n_data: self.n_data,
            buf: self
                .buf
                .iter()
                .map(|v| AtomicI32::new(v.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}
