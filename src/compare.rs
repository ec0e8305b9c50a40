//! Cross-hierarchy comparison.
//!
//! Two trees over the same corpus (different seeds, strategies or
//! configurations) are compared level by level: both levels are flattened,
//! restricted to the documents covered in both, and scored with [`ari`] and
//! [`nmi`].
//!
//! ```text
//! tree A, level l ─▶ [0, 0, 1, -1, 2, ...] ─┐
//!                                           ├─▶ common documents ─▶ ARI, NMI
//! tree B, level l ─▶ [1, 1, 0,  0, -1, ...] ─┘
//! ```

use crate::error::{Error, Result};
use crate::hierarchy::ClusterTree;
use crate::metrics::{ari, nmi};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// Agreement at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAgreement {
    /// Tree level, 0 for the roots.
    pub level: usize,
    /// Documents covered at this level in both trees.
    pub n_common: usize,
    /// `None` with fewer than two common documents.
    pub ari: Option<f64>,
    /// Normalized mutual information, `None` like `ari`.
    pub nmi: Option<f64>,
}

/// Per-level agreement plus means over the levels that could be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyComparison {
    pub levels: Vec<LevelAgreement>,
    /// Mean over scored levels, `None` when no level could be scored.
    pub mean_ari: Option<f64>,
    pub mean_nmi: Option<f64>,
}

/// Compare every level present in both trees.
///
/// # Errors
///
/// [`Error::DocumentCountMismatch`] when the trees cover different corpora.
#[instrument(skip_all, fields(left = a.strategy(), right = b.strategy()))]
pub fn compare(a: &ClusterTree, b: &ClusterTree) -> Result<HierarchyComparison> {
    if a.n_documents() != b.n_documents() {
        return Err(Error::DocumentCountMismatch {
            left: a.n_documents(),
            right: b.n_documents(),
        });
    }

    let depth = a.max_depth().min(b.max_depth());
    let levels: Vec<LevelAgreement> = (0..depth)
        .map(|level| compare_level(level, &a.flatten_level(level), &b.flatten_level(level)))
        .collect();

    let comparison = HierarchyComparison {
        mean_ari: mean(levels.iter().filter_map(|l| l.ari)),
        mean_nmi: mean(levels.iter().filter_map(|l| l.nmi)),
        levels,
    };
    debug!(levels = depth, mean_ari = ?comparison.mean_ari, "hierarchies compared");
    Ok(comparison)
}

fn compare_level(level: usize, a: &[i64], b: &[i64]) -> LevelAgreement {
    let (common_a, common_b): (Vec<i64>, Vec<i64>) = a
        .iter()
        .zip(b)
        .filter(|&(&x, &y)| x >= 0 && y >= 0)
        .map(|(&x, &y)| (x, y))
        .unzip();
    let n_common = common_a.len();
    let scored = n_common >= 2;
    LevelAgreement {
        level,
        n_common,
        ari: scored.then(|| ari(&common_a, &common_b)),
        nmi: scored.then(|| nmi(&common_a, &common_b)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

impl fmt::Display for HierarchyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
        writeln!(f, "level  common     ARI     NMI")?;
        for l in &self.levels {
            writeln!(
                f,
                "{:>5}  {:>6}  {:>6}  {:>6}",
                l.level,
                l.n_common,
                show(l.ari),
                show(l.nmi)
            )?;
        }
        write!(f, " mean          {:>6}  {:>6}", show(self.mean_ari), show(self.mean_nmi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_trees_agree() {
        let levels = [vec![0, 0, 0, 1, 1, 1], vec![0, 0, 1, 2, 2, 3]];
        let a = ClusterTree::from_label_levels(&levels);
        let b = ClusterTree::from_label_levels(&levels);
        let cmp = compare(&a, &b).unwrap();
        assert_eq!(cmp.levels.len(), 2);
        assert!((cmp.mean_ari.unwrap() - 1.0).abs() < 1e-12);
        assert!((cmp.mean_nmi.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_only_common_levels_and_documents() {
        let a = ClusterTree::from_label_levels(&[vec![0, 0, 0, 1, 1, 1], vec![0, 0, 1, 2, 2, 3]]);
        // A single root that never splits: one level, every document in one cluster.
        let b = ClusterTree::from_label_levels(&[vec![0; 6]]);
        let cmp = compare(&a, &b).unwrap();
        assert_eq!(cmp.levels.len(), 1);
        assert_eq!(cmp.levels[0].n_common, 6);
        assert!(cmp.levels[0].ari.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_uncovered_documents_are_excluded() {
        let labels = compare_level(1, &[0, 0, -1, 1, -1], &[-1, 2, 2, 3, 3]);
        assert_eq!(labels.n_common, 2);
        assert!(labels.ari.is_some());

        let none = compare_level(0, &[0, -1, -1], &[-1, 0, 0]);
        assert_eq!(none.n_common, 0);
        assert!(none.ari.is_none());
        assert!(none.nmi.is_none());
        assert!(mean(std::iter::empty()).is_none());
    }

    #[test]
    fn test_different_corpora_rejected() {
        let a = ClusterTree::from_label_levels(&[vec![0, 0, 1, 1]]);
        let b = ClusterTree::from_label_levels(&[vec![0, 1, 1]]);
        assert!(matches!(
            compare(&a, &b),
            Err(Error::DocumentCountMismatch { left: 4, right: 3 })
        ));
    }

    #[test]
    fn test_display_table() {
        let a = ClusterTree::from_label_levels(&[vec![0, 0, 1, 1]]);
        let text = compare(&a, &a).unwrap().to_string();
        assert!(text.contains("ARI"));
        assert!(text.contains("1.000"));
    }
}
