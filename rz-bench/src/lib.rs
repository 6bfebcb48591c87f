//! Shared fixtures for the criterion benches.

use rz_mcts::EdgeStats;

/// Deterministic edge statistics with representative priors and visit counts.
pub fn make_stats(action_space: usize) -> EdgeStats {
    let mut s = EdgeStats::new(action_space);
    for a in 0..action_space {
        s.priors[a] = 1.0 / action_space as f32;
        s.visits[a] = a as u32 % 17;
        s.total_value[a] = (a as f32).sin();
    }
    s
}

/// Roughly half the actions legal.
pub fn make_mask(action_space: usize) -> Vec<bool> {
    (0..action_space).map(|a| a % 2 == 0).collect()
}

/// Deterministic reward stream in `[-1, 1)`.
pub fn make_rewards(n: usize) -> Vec<f32> {
    let mut x: u64 = 0xA5A5_A5A5_0123_4567;
    (0..n)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((x >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_well_formed() {
        let s = make_stats(32);
        assert!((s.priors.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(make_mask(5), vec![true, false, true, false, true]);
        assert!(make_rewards(1000).iter().all(|r| (-1.0..1.0).contains(r)));
    }
}
