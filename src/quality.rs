//! Cluster quality on the embedding geometry.
//!
//! All measures use cosine geometry: rows are L2-normalized once when the
//! evaluator is built.
//!
//! ## Node measures
//!
//! With unit vectors `x_i` and their sum `S = Σ x_i` over a cluster of `n` members:
//!
//! ```text
//! cohesion = mean_i cos(x_i, centroid) = |S| / n
//! density  = mean_{i≠j} x_i · x_j     = (|S|² − Σ |x_i|²) / (n (n − 1))
//! ```
//!
//! Both are O(n·D); density never touches the n² pairs.
//!
//! ## Level measures
//!
//! - **Silhouette** (cosine distance): `(b − a) / max(a, b)` averaged over points,
//!   where `a` is the mean distance to the own cluster and `b` the smallest mean
//!   distance to another cluster. O(n²), so large levels are scored on a seeded sample.
//! - **Calinski–Harabasz**: between-cluster over within-cluster dispersion, each
//!   divided by its degrees of freedom.
//!
//! Both need at least two clusters and `min_labeled` covered documents; otherwise
//! they are `None`.

use crate::error::Result;
use crate::graph::{Metric, PreparedVectors};
use crate::hierarchy::{ClusterTree, NodeQuality};
use ndarray::Array1;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Quality of one hierarchy level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelQuality {
    /// Tree level, 0 for the roots.
    pub level: usize,
    /// Distinct clusters at this level.
    pub n_clusters: usize,
    /// Documents covered by a cluster at this level.
    pub n_labeled: usize,
    /// Mean silhouette under cosine distance, on a sample for large levels.
    pub silhouette: Option<f64>,
    /// Calinski–Harabasz dispersion ratio.
    pub calinski_harabasz: Option<f64>,
}

/// Scores clusters against the corpus embeddings.
#[derive(Debug, Clone)]
pub struct QualityEvaluator {
    vectors: PreparedVectors,
    silhouette_sample: usize,
    min_labeled: usize,
    seed: u64,
}

impl QualityEvaluator {
    /// Normalize `embeddings` for scoring.
    pub fn new(embeddings: &[Vec<f32>]) -> Result<Self> {
        Ok(Self {
            vectors: PreparedVectors::new(embeddings, Metric::Cosine)?,
            silhouette_sample: 5000,
            min_labeled: 10,
            seed: 42,
        })
    }

    /// Score silhouette on at most this many documents.
    pub fn with_silhouette_sample(mut self, sample: usize) -> Self {
        self.silhouette_sample = sample.max(2);
        self
    }

    /// Minimum covered documents for level metrics.
    pub fn with_min_labeled(mut self, min_labeled: usize) -> Self {
        self.min_labeled = min_labeled.max(2);
        self
    }

    /// Seed for silhouette sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of documents the evaluator scores.
    pub fn n_documents(&self) -> usize {
        self.vectors.len()
    }

    /// Sum of member vectors and sum of their squared norms.
    fn member_sums(&self, members: &[usize]) -> (Array1<f64>, f64) {
        let dim = self.vectors.row(0).len();
        let mut sum = Array1::<f64>::zeros(dim);
        let mut norms = 0.0;
        for &m in members {
            let row = self.vectors.row(m);
            for (acc, &v) in sum.iter_mut().zip(row.iter()) {
                *acc += f64::from(v);
            }
            norms += f64::from(row.dot(&row));
        }
        (sum, norms)
    }

    /// Mean cosine of members to their centroid; `None` for fewer than two members
    /// or a zero centroid.
    pub fn cohesion(&self, members: &[usize]) -> Option<f64> {
        if members.len() < 2 {
            return None;
        }
        let (sum, _) = self.member_sums(members);
        let norm = sum.dot(&sum).sqrt();
        if norm == 0.0 {
            return None;
        }
        Some(norm / members.len() as f64)
    }

    /// Mean pairwise cosine among members; `None` for fewer than two members.
    pub fn density(&self, members: &[usize]) -> Option<f64> {
        let n = members.len();
        if n < 2 {
            return None;
        }
        let (sum, norms) = self.member_sums(members);
        Some((sum.dot(&sum) - norms) / (n * (n - 1)) as f64)
    }

    /// Cohesion and density of a document set.
    pub fn node_quality(&self, members: &[usize]) -> NodeQuality {
        NodeQuality {
            cohesion: self.cohesion(members),
            density: self.density(members),
            ..NodeQuality::default()
        }
    }

    /// Quality of one flat labeling; negative labels are uncovered documents.
    pub fn level_quality(&self, level: usize, labels: &[i64]) -> LevelQuality {
        let labeled: Vec<(usize, i64)> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l >= 0)
            .map(|(i, &l)| (i, l))
            .collect();
        let mut clusters: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for &(doc, label) in &labeled {
            clusters.entry(label).or_default().push(doc);
        }

        let mut quality = LevelQuality {
            level,
            n_clusters: clusters.len(),
            n_labeled: labeled.len(),
            silhouette: None,
            calinski_harabasz: None,
        };
        if clusters.len() < 2 || labeled.len() < self.min_labeled {
            debug!(level, clusters = clusters.len(), labeled = labeled.len(), "level metrics unavailable");
            return quality;
        }
        quality.silhouette = self.silhouette(&labeled);
        quality.calinski_harabasz = self.calinski_harabasz(&clusters, labeled.len());
        quality
    }

    /// Level quality for every level of `tree`.
    #[instrument(skip_all, fields(levels = tree.max_depth()))]
    pub fn report(&self, tree: &ClusterTree) -> Vec<LevelQuality> {
        (0..tree.max_depth())
            .map(|level| self.level_quality(level, &tree.flatten_level(level)))
            .collect()
    }

    fn silhouette(&self, labeled: &[(usize, i64)]) -> Option<f64> {
        let sample: Vec<(usize, i64)> = if labeled.len() > self.silhouette_sample {
            let mut rng = StdRng::seed_from_u64(self.seed);
            let mut picked = labeled.to_vec();
            picked.shuffle(&mut rng);
            picked.truncate(self.silhouette_sample);
            picked
        } else {
            labeled.to_vec()
        };

        let mut sizes: BTreeMap<i64, usize> = BTreeMap::new();
        for &(_, label) in &sample {
            *sizes.entry(label).or_insert(0) += 1;
        }
        if sizes.len() < 2 {
            return None;
        }

        let score = |&(doc, label): &(usize, i64)| -> f64 {
            if sizes[&label] < 2 {
                return 0.0;
            }
            let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
            for &(other, other_label) in &sample {
                if other != doc {
                    let d = f64::from(self.vectors.distance(doc, other));
                    *totals.entry(other_label).or_insert(0.0) += d;
                }
            }
            let a = totals.get(&label).copied().unwrap_or(0.0) / (sizes[&label] - 1) as f64;
            let b = totals
                .iter()
                .filter(|(l, _)| **l != label)
                .map(|(l, total)| total / sizes[l] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        };

        // Summed in sample order so the score does not depend on the worker count.
        #[cfg(feature = "parallel")]
        let scores: Vec<f64> = sample.par_iter().map(score).collect();
        #[cfg(not(feature = "parallel"))]
        let scores: Vec<f64> = sample.iter().map(score).collect();
        let total: f64 = scores.iter().sum();

        Some(total / sample.len() as f64)
    }

    fn calinski_harabasz(&self, clusters: &BTreeMap<i64, Vec<usize>>, n: usize) -> Option<f64> {
        let k = clusters.len();
        if n <= k {
            return None;
        }
        let dim = self.vectors.row(0).len();
        let mut overall = Array1::<f64>::zeros(dim);
        let mut centroids = Vec::with_capacity(k);
        for members in clusters.values() {
            let (sum, _) = self.member_sums(members);
            overall += &sum;
            centroids.push(sum / members.len() as f64);
        }
        overall /= n as f64;

        let mut between = 0.0;
        let mut within = 0.0;
        for (members, centroid) in clusters.values().zip(&centroids) {
            let shift = centroid - &overall;
            between += members.len() as f64 * shift.dot(&shift);
            for &m in members {
                within += self
                    .vectors
                    .row(m)
                    .iter()
                    .zip(centroid.iter())
                    .map(|(&x, &c)| (f64::from(x) - c).powi(2))
                    .sum::<f64>();
            }
        }

        if within == 0.0 {
            return Some(1.0);
        }
        Some((between / (k - 1) as f64) / (within / (n - k) as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_directions() -> Vec<Vec<f32>> {
        // Six vectors near +x, six near +y.
        let mut data = Vec::new();
        for i in 0..6 {
            data.push(vec![1.0, 0.02 * i as f32]);
        }
        for i in 0..6 {
            data.push(vec![0.02 * i as f32, 1.0]);
        }
        data
    }

    #[test]
    fn cohesion_and_density_of_identical_vectors() {
        let data = vec![vec![1.0, 0.0]; 4];
        let eval = QualityEvaluator::new(&data).unwrap();
        assert!((eval.cohesion(&[0, 1, 2, 3]).unwrap() - 1.0).abs() < 1e-9);
        assert!((eval.density(&[0, 1, 2, 3]).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn density_matches_pairwise_mean() {
        let data = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let eval = QualityEvaluator::new(&data).unwrap();
        let s = std::f64::consts::FRAC_1_SQRT_2;
        // pairs: (0,1)=0, (0,2)=s, (1,2)=s
        let expected = 2.0 * s / 3.0;
        assert!((eval.density(&[0, 1, 2]).unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn singleton_quality_is_unavailable() {
        let eval = QualityEvaluator::new(&two_directions()).unwrap();
        let q = eval.node_quality(&[3]);
        assert_eq!(q.cohesion, None);
        assert_eq!(q.density, None);
    }

    #[test]
    fn opposite_vectors_have_no_cohesion() {
        let data = vec![vec![1.0, 0.0], vec![-1.0, 0.0]];
        let eval = QualityEvaluator::new(&data).unwrap();
        assert_eq!(eval.cohesion(&[0, 1]), None);
        assert!((eval.density(&[0, 1]).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn separated_level_scores_well() {
        let eval = QualityEvaluator::new(&two_directions()).unwrap();
        let labels: Vec<i64> = (0..12).map(|i| if i < 6 { 0 } else { 1 }).collect();
        let q = eval.level_quality(0, &labels);
        assert_eq!(q.n_clusters, 2);
        assert_eq!(q.n_labeled, 12);
        assert!(q.silhouette.unwrap() > 0.8);
        assert!(q.calinski_harabasz.unwrap() > 10.0);
    }

    #[test]
    fn shuffled_level_scores_poorly() {
        let eval = QualityEvaluator::new(&two_directions()).unwrap();
        let labels: Vec<i64> = (0..12).map(|i| i % 2).collect();
        assert!(eval.level_quality(0, &labels).silhouette.unwrap() < 0.1);
    }

    #[test]
    fn level_metrics_need_enough_coverage() {
        let eval = QualityEvaluator::new(&two_directions()).unwrap();
        let mut labels = vec![-1i64; 12];
        labels[0] = 0;
        labels[1] = 0;
        labels[6] = 1;
        labels[7] = 1;
        let q = eval.level_quality(1, &labels);
        assert_eq!(q.n_labeled, 4);
        assert_eq!(q.silhouette, None);
        assert_eq!(q.calinski_harabasz, None);

        let one_cluster = eval.level_quality(0, &[0; 12]);
        assert_eq!(one_cluster.silhouette, None);
    }

    #[test]
    fn sampled_silhouette_is_deterministic() {
        let eval = QualityEvaluator::new(&two_directions())
            .unwrap()
            .with_silhouette_sample(8)
            .with_seed(3);
        let labels: Vec<i64> = (0..12).map(|i| if i < 6 { 0 } else { 1 }).collect();
        let a = eval.level_quality(0, &labels).silhouette;
        let b = eval.level_quality(0, &labels).silhouette;
        assert_eq!(a, b);
        assert!(a.unwrap() > 0.5);
    }
}
