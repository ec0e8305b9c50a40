//! Partition agreement metrics.
//!
//! Both measures compare two flat labelings of the same documents and ignore the
//! label values themselves: `[0, 0, 1]` and `[5, 5, 2]` are the same partition.
//!
//! | Metric | Range | Best | Properties |
//! |--------|-------|------|------------|
//! | [`ari`] | [-1, 1] | 1 | Pair counting, adjusted for chance |
//! | [`nmi`] | [0, 1] | 1 | Information theoretic, arithmetic-mean normalized |
//!
//! ARI drives redundancy filtering in [`crate::community::ResolutionSelector`];
//! both feed [`crate::compare`].
//!
//! # Example
//!
//! ```rust
//! use canopy::metrics::{ari, nmi};
//!
//! let a = [0, 0, 1, 1, 2, 2];
//! let b = [1, 1, 0, 0, 2, 2];
//! assert!((ari(&a, &b) - 1.0).abs() < 1e-12);
//! assert!((nmi(&a, &b) - 1.0).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! - Hubert & Arabie (1985). "Comparing partitions" (ARI)
//! - Strehl & Ghosh (2002). "Cluster ensembles" (NMI)

use std::collections::HashMap;

/// Normalized Mutual Information between two clusterings.
///
/// ```text
/// NMI(U, V) = 2 * I(U; V) / (H(U) + H(V))
/// ```
///
/// Two constant labelings agree perfectly (1.0). Mismatched lengths or empty
/// input give 0.0.
pub fn nmi<A, B>(a: &[A], b: &[B]) -> f64
where
    A: Copy + Eq + std::hash::Hash,
    B: Copy + Eq + std::hash::Hash,
{
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let table = Contingency::new(a, b);
    let n = table.n as f64;

    let entropy = |counts: &HashMap<usize, usize>| -> f64 {
        counts
            .values()
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.ln()
            })
            .sum()
    };
    let h_a = entropy(&table.rows);
    let h_b = entropy(&table.cols);

    let mut mi = 0.0;
    for (&(r, c), &count) in &table.joint {
        let p_joint = count as f64 / n;
        let p_r = table.rows[&r] as f64 / n;
        let p_c = table.cols[&c] as f64 / n;
        mi += p_joint * (p_joint / (p_r * p_c)).ln();
    }

    let denom = h_a + h_b;
    if denom > 0.0 {
        (2.0 * mi / denom).clamp(0.0, 1.0)
    } else {
        1.0 // Both are constant
    }
}

/// Adjusted Rand Index between two clusterings.
///
/// ARI is the corrected-for-chance version of the Rand Index: 0 for
/// independent labelings, 1 for identical partitions.
///
/// Identical degenerate partitions (all one cluster, all singletons) score 1.0.
/// Mismatched lengths, empty input or a single element give 0.0.
pub fn ari<A, B>(a: &[A], b: &[B]) -> f64
where
    A: Copy + Eq + std::hash::Hash,
    B: Copy + Eq + std::hash::Hash,
{
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let table = Contingency::new(a, b);

    let sum_comb_ij: f64 = table.joint.values().map(|&c| comb2(c)).sum();
    let sum_comb_a: f64 = table.rows.values().map(|&c| comb2(c)).sum();
    let sum_comb_b: f64 = table.cols.values().map(|&c| comb2(c)).sum();
    let comb_n = comb2(table.n);

    // ARI = (index - expected) / (max - expected)
    let expected = sum_comb_a * sum_comb_b / comb_n;
    let max_index = (sum_comb_a + sum_comb_b) / 2.0;

    let denom = max_index - expected;
    if denom.abs() < 1e-10 {
        return if (sum_comb_ij - expected).abs() < 1e-10 { 1.0 } else { 0.0 };
    }

    (sum_comb_ij - expected) / denom
}

/// Joint and marginal counts over dense ids assigned to each distinct label.
struct Contingency {
    joint: HashMap<(usize, usize), usize>,
    rows: HashMap<usize, usize>,
    cols: HashMap<usize, usize>,
    n: usize,
}

impl Contingency {
    fn new<A, B>(a: &[A], b: &[B]) -> Self
    where
        A: Copy + Eq + std::hash::Hash,
        B: Copy + Eq + std::hash::Hash,
    {
        let mut ids_a: HashMap<A, usize> = HashMap::new();
        let mut ids_b: HashMap<B, usize> = HashMap::new();
        let mut joint = HashMap::new();
        let mut rows = HashMap::new();
        let mut cols = HashMap::new();
        for (&la, &lb) in a.iter().zip(b) {
            let next_a = ids_a.len();
            let ra = *ids_a.entry(la).or_insert(next_a);
            let next_b = ids_b.len();
            let cb = *ids_b.entry(lb).or_insert(next_b);
            *joint.entry((ra, cb)).or_insert(0) += 1;
            *rows.entry(ra).or_insert(0) += 1;
            *cols.entry(cb).or_insert(0) += 1;
        }
        Self {
            joint,
            rows,
            cols,
            n: a.len(),
        }
    }
}

fn comb2(n: usize) -> f64 {
    if n < 2 {
        0.0
    } else {
        (n * (n - 1) / 2) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nmi_perfect() {
        let pred = [0, 0, 1, 1, 2, 2];
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((nmi(&pred, &truth) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_nmi_permuted() {
        // Same clustering, different labels
        let pred = [1, 1, 0, 0, 2, 2];
        let truth = [0, 0, 1, 1, 2, 2];
        assert!((nmi(&pred, &truth) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_nmi_independent_is_zero() {
        let a = [0, 0, 1, 1];
        let b = [0, 1, 0, 1];
        assert!(nmi(&a, &b).abs() < 1e-12);
    }

    #[test]
    fn test_ari_perfect() {
        let pred = [0, 0, 1, 1];
        let truth = [0, 0, 1, 1];
        assert!((ari(&pred, &truth) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_ari_mixed_label_types() {
        let a: [i64; 4] = [3, 3, -1, -1];
        let b: [usize; 4] = [0, 0, 1, 1];
        assert!((ari(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ari_disagreement_below_one() {
        let a = [0, 0, 0, 1, 1, 1];
        let b = [0, 0, 1, 1, 2, 2];
        let score = ari(&a, &b);
        assert!(score < 0.5, "ari = {score}");
        assert!(score > -1.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(ari(&[0usize; 5], &[7usize; 5]), 1.0);
        assert_eq!(ari::<usize, usize>(&[], &[]), 0.0);
        assert_eq!(ari(&[0usize], &[0usize]), 0.0);
        assert_eq!(nmi(&[0usize, 1], &[0usize]), 0.0);
    }
}
