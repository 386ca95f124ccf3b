// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stochastic synaptic transmission failure
//!
//! A failed synapse carries Wt == 0 for the rest of the trial. Each synapse
//! draws from its own generator seeded by (network seed, trial, synapse), so
//! the outcome is independent of dispatch order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spikenet_npu_neural::{Context, SynapseVar, VarRow};
use spikenet_npu_runtime::{ComputeBackend, Connection, SynapseArray};

use crate::conn_rows;

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for one synapse's failure draw on one trial
#[inline]
pub fn syn_seed(seed: u64, trial: u64, syn: u64) -> u64 {
    splitmix64(splitmix64(splitmix64(seed) ^ trial) ^ syn)
}

/// Restores synapses that failed on the previous trial, then draws new
/// failures when the connection has a nonzero failure probability
pub fn syn_fail(
    ctx: &Context,
    conn: &Connection,
    syns: &mut SynapseArray,
    seed: u64,
    backend: &dyn ComputeBackend,
) {
    let com = &conn.params.com;
    let swt = &conn.params.swt;
    let syn_st = conn.syn_st;
    let trial = ctx.trial;
    backend.for_each_row(conn_rows(&mut syns.vals, conn), SynapseVar::COUNT, &|k, row| {
        if row.var(SynapseVar::Wt) == 0.0 {
            let wt = swt.wt_val(row.var(SynapseVar::SWt), row.var(SynapseVar::LWt));
            row.set_var(SynapseVar::Wt, wt);
        }
        if com.p_fail > 0.0 {
            let mut rng = StdRng::seed_from_u64(syn_seed(seed, trial, (syn_st + k) as u64));
            com.fail(row, rng.gen::<f32>());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_npu_runtime::{ConnParams, GBuf, Pattern, SerialBackend};

    fn conn(n: usize, p_fail: f32) -> (Connection, SynapseArray) {
        let mut syns = SynapseArray::new(1);
        let pairs: Vec<(u32, u32)> = (0..n as u32).map(|i| (i, 0)).collect();
        for &(s, r) in &pairs {
            let si = syns.push(s, r, 0);
            syns.set(si, SynapseVar::SWt, 0.5);
            syns.set(si, SynapseVar::LWt, 0.5);
            syns.set(si, SynapseVar::Wt, 0.5);
        }
        let mut params = ConnParams::default();
        params.com.p_fail = p_fail;
        let mut c = Connection {
            name: "c".to_string(),
            index: 0,
            send: 0,
            recv: 1,
            pattern: Pattern::default(),
            params,
            syn_st: 0,
            n_syns: 0,
            send_con: Vec::new(),
            recv_con: Vec::new(),
            recv_syn_idx: Vec::new(),
            gbuf: GBuf::new(1, 3, 1),
            gscale: 1.0,
        };
        c.index_pairs(&pairs, n, 1);
        (c, syns)
    }

    #[test]
    fn test_failures_are_deterministic_and_restored() {
        let ctx = Context::new(1);
        let (c, mut a) = conn(200, 0.5);
        let (_, mut b) = conn(200, 0.5);
        syn_fail(&ctx, &c, &mut a, 7, &SerialBackend::new());
        syn_fail(&ctx, &c, &mut b, 7, &SerialBackend::new());
        assert_eq!(a.vals, b.vals);

        let failed = (0..200).filter(|&i| a.get(i, SynapseVar::Wt) == 0.0).count();
        assert!(failed > 50 && failed < 150, "failed {}", failed);

        // next trial with failure off: everything restored
        let mut c_off = c.clone();
        c_off.params.com.p_fail = 0.0;
        syn_fail(&ctx, &c_off, &mut a, 7, &SerialBackend::new());
        assert!((0..200).all(|i| a.get(i, SynapseVar::Wt) > 0.0));
    }

    #[test]
    fn test_seed_mixing_separates_trials() {
        assert_ne!(syn_seed(1, 1, 0), syn_seed(1, 2, 0));
        assert_ne!(syn_seed(1, 1, 0), syn_seed(1, 1, 1));
        assert_eq!(syn_seed(9, 4, 2), syn_seed(9, 4, 2));
    }
}
