//! Exact kNN graph construction from document embeddings.
//!
//! Given a set of embeddings, build an undirected graph where:
//! - Each embedding becomes a node
//! - `{i, j}` is an edge iff `j` is among the `k` nearest neighbors of `i`, or vice versa
//! - Each unordered edge is stored exactly once
//!
//! The resulting graph is the input to [`crate::community`].
//!
//! ```text
//! Embeddings → exact kNN (per-row, parallel) → symmetrized edge set → Leiden → Communities
//! ```
//!
//! # Determinism
//!
//! Neighbor search is exact. Candidates are ordered by `(distance, index)`, so ties
//! always resolve toward the lower document index and the edge set does not depend on
//! how rows are scheduled across threads.
//!
//! # Edge weights
//!
//! Community detection only needs edge existence, so the default weight is
//! [`WeightFunction::Uniform`]. The other weight functions are kept for diagnostics and
//! for weighted detection experiments:
//! - **Similarity**: `w = 1 - d`, clamped to stay positive
//! - **InverseDistance**: `w = 1 / (1 + d)`
//! - **GaussianKernel**: `w = exp(-d² / σ²)` with σ the median kNN distance

use super::metric::{check_embeddings, Metric, PreparedVectors};
use crate::error::{Error, Result};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Undirected document graph; node `i` is document (or subset member) `i`.
pub type SimilarityGraph = UnGraph<(), f32>;

/// How to compute edge weights from distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightFunction {
    /// w = 1 - distance (for cosine distance in [0, 2])
    Similarity,
    /// w = 1 / (1 + distance)
    InverseDistance,
    /// w = exp(-distance² / σ²) where σ is the median kNN distance
    GaussianKernel,
    /// w = 1.0 (unweighted)
    #[default]
    Uniform,
}

/// Builder for symmetrized kNN graphs.
#[derive(Debug, Clone)]
pub struct KnnGraphBuilder {
    /// Number of neighbors per node.
    k: usize,
    /// Distance metric.
    metric: Metric,
    /// Edge weight function.
    weight_fn: WeightFunction,
}

impl KnnGraphBuilder {
    /// Create a builder for `k` neighbors under cosine distance.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            metric: Metric::Cosine,
            weight_fn: WeightFunction::Uniform,
        }
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the edge weight function.
    pub fn with_weight_fn(mut self, weight_fn: WeightFunction) -> Self {
        self.weight_fn = weight_fn;
        self
    }

    /// Number of neighbors per node.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Distance metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Build the graph over every document.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] for an empty corpus
    /// - [`Error::DimensionMismatch`] for ragged vectors
    /// - [`Error::InvalidParameter`] unless `1 <= k < N`
    #[instrument(skip_all, fields(n = embeddings.len(), k = self.k, metric = %self.metric))]
    pub fn build(&self, embeddings: &[Vec<f32>]) -> Result<SimilarityGraph> {
        check_embeddings(embeddings)?;
        self.check_k(embeddings.len())?;
        let prepared = PreparedVectors::new(embeddings, self.metric)?;
        Ok(self.build_prepared(&prepared))
    }

    /// Build the graph over a subset of documents.
    ///
    /// Node `i` of the returned graph is `members[i]`. `k` is clamped to
    /// `members.len() - 1`, so any subset with at least two members yields a graph.
    pub fn build_subset(&self, embeddings: &[Vec<f32>], members: &[usize]) -> Result<SimilarityGraph> {
        if members.len() < 2 {
            return Err(Error::invalid(
                "members",
                "a subset graph needs at least two documents",
            ));
        }
        let prepared = PreparedVectors::subset(embeddings, members, self.metric)?;
        let clamped = Self {
            k: self.k.clamp(1, members.len() - 1),
            ..self.clone()
        };
        Ok(clamped.build_prepared(&prepared))
    }

    fn check_k(&self, n: usize) -> Result<()> {
        if self.k == 0 || self.k >= n {
            return Err(Error::invalid(
                "k",
                format!("must satisfy 1 <= k < N (k = {}, N = {n})", self.k),
            ));
        }
        Ok(())
    }

    fn build_prepared(&self, prepared: &PreparedVectors) -> SimilarityGraph {
        let n = prepared.len();
        let neighbors = nearest_neighbors(prepared, self.k);

        let sigma = if self.weight_fn == WeightFunction::GaussianKernel {
            median_distance(&neighbors).max(f32::EPSILON)
        } else {
            1.0
        };

        // Each unordered pair once, keyed (low, high).
        let mut edges: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for (i, row) in neighbors.iter().enumerate() {
            for &(j, distance) in row {
                let key = if i < j { (i, j) } else { (j, i) };
                let weight = match self.weight_fn {
                    WeightFunction::Similarity => (1.0 - distance).max(0.001),
                    WeightFunction::InverseDistance => 1.0 / (1.0 + distance),
                    WeightFunction::GaussianKernel => {
                        (-distance * distance / (sigma * sigma)).exp().max(f32::MIN_POSITIVE)
                    }
                    WeightFunction::Uniform => 1.0,
                };
                let _ = edges.entry(key).or_insert(weight);
            }
        }

        let mut graph = SimilarityGraph::with_capacity(n, edges.len());
        for _ in 0..n {
            let _ = graph.add_node(());
        }
        for ((i, j), w) in edges {
            let _ = graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), w);
        }
        debug!(nodes = n, edges = graph.edge_count(), "built kNN graph");
        graph
    }
}

impl Default for KnnGraphBuilder {
    fn default() -> Self {
        Self::new(15)
    }
}

/// Exact `k` nearest neighbors of every prepared row, excluding the row itself.
///
/// Each list is sorted by `(distance, index)`.
pub fn nearest_neighbors(prepared: &PreparedVectors, k: usize) -> Vec<Vec<(usize, f32)>> {
    let n = prepared.len();
    let k = k.min(n.saturating_sub(1));
    let search = |i: usize| -> Vec<(usize, f32)> {
        let mut candidates: Vec<(usize, f32)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, prepared.distance(i, j)))
            .collect();
        if k == 0 {
            return Vec::new();
        }
        if candidates.len() > k {
            let _ = candidates.select_nth_unstable_by(k - 1, cmp_candidate);
            candidates.truncate(k);
        }
        candidates.sort_by(cmp_candidate);
        candidates
    };

    #[cfg(feature = "parallel")]
    let rows = (0..n).into_par_iter().map(search).collect();
    #[cfg(not(feature = "parallel"))]
    let rows = (0..n).map(search).collect();
    rows
}

fn cmp_candidate(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

fn median_distance(neighbors: &[Vec<(usize, f32)>]) -> f32 {
    let mut distances: Vec<f32> = neighbors
        .iter()
        .flat_map(|row| row.iter().map(|&(_, d)| d))
        .collect();
    if distances.is_empty() {
        return 1.0;
    }
    distances.sort_by(f32::total_cmp);
    distances[distances.len() / 2]
}
