//! HDBSCAN: hierarchical density-based clustering with noise.
//!
//! # The Algorithm (Campello, Moulavi & Sander, 2013)
//!
//! DBSCAN needs a global radius ε and struggles when clusters have different
//! densities. HDBSCAN removes ε by considering every radius at once:
//!
//! 1. **Core distance**: `core(p)` = distance from p to its `min_samples`-th
//!    nearest neighbor (p itself counts as the first).
//! 2. **Mutual reachability**: `mr(a, b) = max(core(a), core(b), d(a, b))`.
//!    Sparse points are pushed away from everything.
//! 3. **Minimum spanning tree** of the complete mutual-reachability graph
//!    (Prim, O(n²) time, O(n) memory).
//! 4. **Single-linkage dendrogram** from the MST edges ([`Dendrogram`]).
//! 5. **Condensed tree**: walk the dendrogram top-down with `λ = 1 / distance`;
//!    a split where both sides have at least `min_cluster_size` points births two
//!    clusters, otherwise the small side's points "fall out" of the parent.
//! 6. **Selection**: excess of mass (stable clusters win over their children) or
//!    leaf (the finest clusters). The root is never selected, so a single blob
//!    yields no clusters rather than one cluster holding everything.
//!
//! ```text
//!   λ ▲
//!     │        ┌──┐   ┌──┐
//!     │        │A │   │B │      stability(C) = Σ_p (λ_p − λ_birth(C))
//!     │        └┬─┘   └┬─┘
//!     │         └──┬───┘        EOM keeps C if stability(C) ≥ Σ children
//!     │           root
//!     └──────────────────────▶ points
//! ```
//!
//! Points that fall out of a cluster that is neither selected nor below a
//! selected cluster are noise (`None`).
//!
//! ## References
//!
//! Campello, Moulavi, Sander (2013). "Density-Based Clustering Based on
//! Hierarchical Density Estimates." PAKDD.
//! McInnes, Healy (2017). "Accelerated Hierarchical Density Based Clustering."

use super::dendrogram::Dendrogram;
use crate::error::{Error, Result};
use crate::graph::{nearest_neighbors, Metric, PreparedVectors};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// How flat clusters are read off the condensed tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterSelection {
    /// Excess of mass: the most persistent clusters.
    #[default]
    Eom,
    /// The leaves of the condensed tree: many small, homogeneous clusters.
    Leaf,
}

/// HDBSCAN clustering algorithm.
#[derive(Debug, Clone)]
pub struct Hdbscan {
    min_cluster_size: usize,
    /// Defaults to `min_cluster_size` when unset.
    min_samples: Option<usize>,
    metric: Metric,
    selection: ClusterSelection,
}

impl Hdbscan {
    /// Create a new HDBSCAN clusterer.
    ///
    /// `min_cluster_size` is the smallest group that counts as a cluster (>= 2).
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size,
            min_samples: None,
            metric: Metric::Cosine,
            selection: ClusterSelection::Eom,
        }
    }

    /// Set the neighbor count used for core distances.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = Some(min_samples);
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the cluster selection method.
    pub fn with_selection(mut self, selection: ClusterSelection) -> Self {
        self.selection = selection;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(Error::invalid("min_cluster_size", "must be >= 2"));
        }
        if self.min_samples == Some(0) {
            return Err(Error::invalid("min_samples", "must be >= 1"));
        }
        Ok(())
    }

    /// Cluster every row of `embeddings`. `None` marks noise.
    pub fn fit(&self, embeddings: &[Vec<f32>]) -> Result<Vec<Option<usize>>> {
        self.validate()?;
        let prepared = PreparedVectors::new(embeddings, self.metric)?;
        self.fit_prepared(&prepared)
    }

    /// Cluster the rows named by `members`; output is aligned with `members`.
    pub fn fit_subset(&self, embeddings: &[Vec<f32>], members: &[usize]) -> Result<Vec<Option<usize>>> {
        self.validate()?;
        let prepared = PreparedVectors::subset(embeddings, members, self.metric)?;
        self.fit_prepared(&prepared)
    }

    fn fit_prepared(&self, prepared: &PreparedVectors) -> Result<Vec<Option<usize>>> {
        let n = prepared.len();
        if n < self.min_cluster_size.max(2) {
            return Ok(vec![None; n]);
        }

        let min_samples = self.min_samples.unwrap_or(self.min_cluster_size);
        let core = core_distances(prepared, min_samples);
        let mst = mutual_reachability_mst(prepared, &core);
        let dendrogram = Dendrogram::from_spanning_tree(n, &mst)?;
        let tree = CondensedTree::new(&dendrogram, self.min_cluster_size);

        let selected = match self.selection {
            ClusterSelection::Eom => tree.select_eom(),
            ClusterSelection::Leaf => tree.select_leaves(),
        };
        Ok(tree.label(&selected))
    }
}

fn core_distances(prepared: &PreparedVectors, min_samples: usize) -> Vec<f64> {
    // The point itself is the first of its `min_samples` neighbors.
    let k = min_samples.saturating_sub(1);
    if k == 0 {
        return vec![0.0; prepared.len()];
    }
    nearest_neighbors(prepared, k)
        .iter()
        .map(|row| row.last().map_or(0.0, |&(_, d)| f64::from(d)))
        .collect()
}

/// Prim's algorithm over the implicit complete mutual-reachability graph.
fn mutual_reachability_mst(prepared: &PreparedVectors, core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = prepared.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    let mut current = 0;
    in_tree[0] = true;
    for _ in 1..n {
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let reach = f64::from(prepared.distance(current, j))
                .max(core[current])
                .max(core[j]);
            if reach < best[j] {
                best[j] = reach;
                from[j] = current;
            }
        }

        let mut next: Option<usize> = None;
        for j in 0..n {
            if !in_tree[j] && next.map_or(true, |b| best[j] < best[b]) {
                next = Some(j);
            }
        }
        let Some(next) = next else { break };
        in_tree[next] = true;
        edges.push((from[next], next, best[next]));
        current = next;
    }
    edges
}

/// One edge of the condensed tree. Cluster ids start at `n_points` (the root).
#[derive(Debug, Clone, Copy)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

struct CondensedTree {
    edges: Vec<CondensedEdge>,
    n_points: usize,
    n_clusters: usize,
}

fn lambda_of(distance: f64) -> f64 {
    1.0 / distance.max(1e-12)
}

impl CondensedTree {
    fn new(dendrogram: &Dendrogram, min_cluster_size: usize) -> Self {
        let n = dendrogram.n_items();
        let mut edges = Vec::new();
        let root = n + dendrogram.n_merges().saturating_sub(1);
        let mut relabel: HashMap<usize, usize> = HashMap::new();
        let _ = relabel.insert(root, n);
        let mut next_label = n + 1;

        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            let Some(merge) = dendrogram.merge_of(node) else {
                continue;
            };
            let parent = relabel.get(&node).copied().unwrap_or(n);
            let lambda = lambda_of(merge.distance);
            let (a, b) = (merge.cluster_a, merge.cluster_b);
            let big_a = dendrogram.size_of(a) >= min_cluster_size;
            let big_b = dendrogram.size_of(b) >= min_cluster_size;

            let fall_out = |side: usize, edges: &mut Vec<CondensedEdge>| {
                for point in dendrogram.leaves_of(side) {
                    edges.push(CondensedEdge {
                        parent,
                        child: point,
                        lambda,
                        size: 1,
                    });
                }
            };

            match (big_a, big_b) {
                (true, true) => {
                    for side in [a, b] {
                        let _ = relabel.insert(side, next_label);
                        edges.push(CondensedEdge {
                            parent,
                            child: next_label,
                            lambda,
                            size: dendrogram.size_of(side),
                        });
                        next_label += 1;
                        queue.push_back(side);
                    }
                }
                (true, false) => {
                    let _ = relabel.insert(a, parent);
                    queue.push_back(a);
                    fall_out(b, &mut edges);
                }
                (false, true) => {
                    let _ = relabel.insert(b, parent);
                    queue.push_back(b);
                    fall_out(a, &mut edges);
                }
                (false, false) => {
                    fall_out(a, &mut edges);
                    fall_out(b, &mut edges);
                }
            }
        }

        Self {
            edges,
            n_points: n,
            n_clusters: next_label - n,
        }
    }

    /// Child clusters of each cluster (indexed from 0 = root).
    fn cluster_children(&self) -> Vec<Vec<usize>> {
        let mut children = vec![Vec::new(); self.n_clusters];
        for e in &self.edges {
            if e.child >= self.n_points {
                children[e.parent - self.n_points].push(e.child - self.n_points);
            }
        }
        children
    }

    fn stabilities(&self) -> Vec<f64> {
        let mut birth = vec![0.0; self.n_clusters];
        for e in &self.edges {
            if e.child >= self.n_points {
                birth[e.child - self.n_points] = e.lambda;
            }
        }
        let mut stability = vec![0.0; self.n_clusters];
        for e in &self.edges {
            let c = e.parent - self.n_points;
            stability[c] += (e.lambda - birth[c]) * e.size as f64;
        }
        stability
    }

    fn select_eom(&self) -> Vec<bool> {
        let children = self.cluster_children();
        let mut stability = self.stabilities();
        let mut selected = vec![false; self.n_clusters];

        // Children always carry larger ids than their parent.
        for c in (1..self.n_clusters).rev() {
            let child_sum: f64 = children[c].iter().map(|&k| stability[k]).sum();
            if !children[c].is_empty() && child_sum > stability[c] {
                stability[c] = child_sum;
            } else {
                selected[c] = true;
                let mut stack = children[c].clone();
                while let Some(d) = stack.pop() {
                    selected[d] = false;
                    stack.extend(children[d].iter().copied());
                }
            }
        }
        selected
    }

    fn select_leaves(&self) -> Vec<bool> {
        let children = self.cluster_children();
        (0..self.n_clusters)
            .map(|c| c != 0 && children[c].is_empty())
            .collect()
    }

    /// Flat labels, consecutive in order of first appearance; `None` for noise.
    fn label(&self, selected: &[bool]) -> Vec<Option<usize>> {
        let mut cluster_parent = vec![0usize; self.n_clusters];
        let mut point_parent = vec![0usize; self.n_points];
        for e in &self.edges {
            let parent = e.parent - self.n_points;
            if e.child >= self.n_points {
                cluster_parent[e.child - self.n_points] = parent;
            } else {
                point_parent[e.child] = parent;
            }
        }

        let mut ids: HashMap<usize, usize> = HashMap::new();
        point_parent
            .iter()
            .map(|&start| {
                let mut c = start;
                while c != 0 && !selected[c] {
                    c = cluster_parent[c];
                }
                if c == 0 {
                    return None;
                }
                let next = ids.len();
                Some(*ids.entry(c).or_insert(next))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 5 x 2 grid with spacing 0.1 anchored at `(x, y)`.
    fn blob(x: f32, y: f32) -> Vec<Vec<f32>> {
        (0..10)
            .map(|i| vec![x + (i % 5) as f32 * 0.1, y + (i / 5) as f32 * 0.1])
            .collect()
    }

    fn euclidean(min_cluster_size: usize) -> Hdbscan {
        Hdbscan::new(min_cluster_size).with_metric(Metric::Euclidean)
    }

    #[test]
    fn test_hdbscan_two_blobs_and_noise() {
        let mut data = blob(0.0, 0.0);
        data.extend(blob(10.0, 10.0));
        data.push(vec![100.0, -100.0]);

        let labels = euclidean(6).fit(&data).unwrap();

        assert_eq!(labels.len(), 21);
        assert!(labels[..10].iter().all(|l| *l == Some(0)));
        assert!(labels[10..20].iter().all(|l| *l == Some(1)));
        assert_eq!(labels[20], None);
    }

    #[test]
    fn test_hdbscan_leaf_selection_is_finer() {
        let mut data = blob(0.0, 0.0);
        data.extend(blob(2.0, 0.0));
        data.extend(blob(50.0, 50.0));

        let count = |labels: &[Option<usize>]| labels.iter().flatten().max().map_or(0, |m| m + 1);
        let leaf = euclidean(6)
            .with_selection(ClusterSelection::Leaf)
            .fit(&data)
            .unwrap();
        let eom = euclidean(6).fit(&data).unwrap();

        assert_eq!(count(&leaf), 3);
        assert!((2..=3).contains(&count(&eom)));
        assert_ne!(leaf[0], leaf[10]);
        assert_ne!(leaf[10], leaf[20]);
    }

    #[test]
    fn test_hdbscan_single_blob_has_no_cluster() {
        // The root is never selected.
        let labels = euclidean(6).fit(&blob(0.0, 0.0)).unwrap();
        assert!(labels.iter().all(Option::is_none));
    }

    #[test]
    fn test_hdbscan_too_few_points() {
        let labels = euclidean(5).fit(&blob(0.0, 0.0)[..3]).unwrap();
        assert_eq!(labels, vec![None; 3]);
    }

    #[test]
    fn test_hdbscan_subset_aligns_with_members() {
        let mut data = blob(0.0, 0.0);
        data.extend(blob(10.0, 10.0));
        let members: Vec<usize> = (0..20).rev().collect();

        let labels = euclidean(6).fit_subset(&data, &members).unwrap();
        // members[0] = 19 lives in the second blob, which is seen first.
        assert_eq!(labels[0], Some(0));
        assert_eq!(labels[19], Some(1));
    }

    #[test]
    fn test_hdbscan_rejects_bad_parameters() {
        let data = blob(0.0, 0.0);
        assert!(euclidean(1).fit(&data).is_err());
        assert!(euclidean(4).with_min_samples(0).fit(&data).is_err());
        assert!(matches!(euclidean(4).fit(&[]), Err(Error::EmptyInput)));
    }
}
