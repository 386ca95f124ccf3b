// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Trial statistics

/// Centered cosine similarity between minus- and plus-phase activity.
///
/// Each side is centered by its own mean. A zero-variance side yields 0.
pub fn cor_sim(act_m: &[f32], act_p: &[f32], avg_m: f32, avg_p: f32) -> f32 {
    let mut ss = 0.0f32;
    let mut ssm = 0.0f32;
    let mut ssp = 0.0f32;
    for (&m, &p) in act_m.iter().zip(act_p) {
        let (dm, dp) = (m - avg_m, p - avg_p);
        ss += dm * dp;
        ssm += dm * dm;
        ssp += dp * dp;
    }
    let denom = (ssm * ssp).sqrt();
    if denom > 0.0 {
        ss / denom
    } else {
        0.0
    }
}

fn mean(v: &[f32]) -> f32 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f32>() / v.len() as f32
    }
}

/// Centered cosine with means taken from the inputs
pub fn cor_sim_auto(act_m: &[f32], act_p: &[f32]) -> f32 {
    cor_sim(act_m, act_p, mean(act_m), mean(act_p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_one() {
        let a = [0.1, 0.9, 0.3, 0.7];
        assert!((cor_sim_auto(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_anti_correlated_is_minus_one() {
        let a = [0.0, 1.0, 0.0, 1.0];
        let b = [1.0, 0.0, 1.0, 0.0];
        assert!((cor_sim_auto(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_side_is_zero() {
        let a = [0.5; 4];
        let b = [0.0, 1.0, 0.0, 1.0];
        assert_eq!(cor_sim_auto(&a, &b), 0.0);
        assert_eq!(cor_sim_auto(&[], &[]), 0.0);
    }

    #[test]
    fn test_scale_invariant() {
        let a = [0.1, 0.4, 0.2, 0.8];
        let b: Vec<f32> = a.iter().map(|v| v * 0.5 + 0.1).collect();
        assert!((cor_sim_auto(&a, &b) - 1.0).abs() < 1e-5);
    }
}
