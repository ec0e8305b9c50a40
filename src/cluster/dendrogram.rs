//! Single-linkage dendrogram built from a minimum spanning tree.
//!
//! Merge `i` creates cluster id `n_items + i`; ids below `n_items` are the
//! original points. This is the scipy `linkage` layout, so the last merge is
//! the root (`2 * n_items - 2`) whenever the spanning tree is connected.

use crate::error::{Error, Result};

/// A dendrogram representing hierarchical cluster merges.
///
/// Each merge combines two clusters into one, recording:
/// - Which clusters were merged
/// - The distance at which they merged
/// - The size of the resulting cluster
#[derive(Debug, Clone)]
pub struct Dendrogram {
    merges: Vec<Merge>,
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// First cluster being merged (index).
    pub cluster_a: usize,
    /// Second cluster being merged (index).
    pub cluster_b: usize,
    /// Distance/dissimilarity at which merge occurred.
    pub distance: f64,
    /// Size of resulting cluster.
    pub size: usize,
}

impl Dendrogram {
    /// Create an empty dendrogram for n items.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Single-linkage dendrogram from spanning-tree edges `(a, b, distance)`.
    ///
    /// Edges are merged in ascending distance order (ties by endpoint indices).
    pub fn from_spanning_tree(n_items: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        let mut sorted = edges.to_vec();
        sorted.sort_by(|x, y| {
            x.2.total_cmp(&y.2)
                .then(x.0.cmp(&y.0))
                .then(x.1.cmp(&y.1))
        });

        let mut dendrogram = Self::new(n_items);
        let mut sets = UnionFind::new(n_items);
        for (a, b, distance) in sorted {
            if a >= n_items || b >= n_items {
                return Err(Error::invalid(
                    "edges",
                    format!("edge ({a}, {b}) outside {n_items} items"),
                ));
            }
            let (ra, rb) = (sets.find(a), sets.find(b));
            if ra == rb {
                continue;
            }
            let cluster_a = sets.label[ra];
            let cluster_b = sets.label[rb];
            let size = sets.size[ra] + sets.size[rb];
            let new_label = n_items + dendrogram.merges.len();
            dendrogram.add_merge(cluster_a, cluster_b, distance, size);
            sets.union(ra, rb, new_label);
        }
        Ok(dendrogram)
    }

    /// Record a merge operation.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, distance: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            distance,
            size,
        });
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Iterate over merges.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// The merge that created cluster `id`, if `id` is not an original item.
    pub fn merge_of(&self, id: usize) -> Option<&Merge> {
        id.checked_sub(self.n_items).and_then(|i| self.merges.get(i))
    }

    /// Number of original items under cluster `id`.
    pub fn size_of(&self, id: usize) -> usize {
        self.merge_of(id).map_or(1, |m| m.size)
    }

    /// Original items under cluster `id`, ascending.
    pub fn leaves_of(&self, id: usize) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            match self.merge_of(node) {
                Some(m) => {
                    stack.push(m.cluster_a);
                    stack.push(m.cluster_b);
                }
                None => leaves.push(node),
            }
        }
        leaves.sort_unstable();
        leaves
    }

    /// Flat assignment after cutting every merge above `threshold`.
    ///
    /// Labels are consecutive in order of first appearance.
    pub fn cut_at_distance(&self, threshold: f64) -> Vec<usize> {
        let mut sets = UnionFind::new(self.n_items);
        // Representative point of every cluster id created so far.
        let mut representative: Vec<usize> = (0..self.n_items).collect();
        for merge in &self.merges {
            let rep_a = representative[merge.cluster_a];
            if merge.distance <= threshold {
                let (ra, rb) = (sets.find(rep_a), sets.find(representative[merge.cluster_b]));
                sets.union(ra, rb, 0);
            }
            representative.push(rep_a);
        }

        let mut ids = std::collections::HashMap::new();
        (0..self.n_items)
            .map(|i| {
                let root = sets.find(i);
                let next = ids.len();
                *ids.entry(root).or_insert(next)
            })
            .collect()
    }
}

/// Union-find with path halving; `label` tracks the dendrogram id of each set.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    label: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            label: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, ra: usize, rb: usize, label: usize) {
        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.label[big] = label;
    }
}
