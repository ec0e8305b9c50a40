//! Louvain algorithm for community detection.
//!
//! Fast modularity optimization through local node moves and graph aggregation.
//!
//! ## The Algorithm (Blondel et al. 2008)
//!
//! Louvain is a multi-level, greedy modularity optimization algorithm:
//!
//! 1. **Phase 1 (Local Moving)**: Start with each node in its own community.
//!    Sweep over the nodes in a seeded random order, moving each to the
//!    neighboring community with the highest modularity gain, until a full
//!    sweep makes no move.
//!
//! 2. **Phase 2 (Aggregation)**: Build a meta-graph where communities become
//!    single nodes. Edge weights are sums of edges between communities.
//!    Self-loops represent internal community edges.
//!
//! 3. **Iterate**: Repeat phases 1-2 on the meta-graph until modularity
//!    stops improving.
//!
//! Unlike [`super::Leiden`], Louvain never revisits a community once it has been
//! aggregated, so a community may end up internally disconnected.
//!
//! ## References
//!
//! Blondel et al. (2008). "Fast unfolding of communities in large networks."
//! Journal of Statistical Mechanics: Theory and Experiment, P10008.

use super::traits::{finish, prepare, CommunityDetection, Partition};
use super::weighted::{renumber, LocalMover, WeightedGraph};
use crate::error::Result;
use petgraph::graph::UnGraph;
use rand::prelude::*;

/// Louvain community detection algorithm.
#[derive(Debug, Clone)]
pub struct Louvain {
    /// Maximum sweeps per level.
    max_iter: usize,
    /// Maximum levels of aggregation.
    max_levels: usize,
    /// Minimum modularity improvement to continue.
    min_modularity_gain: f64,
    /// Random seed for sweep order.
    seed: u64,
}

impl Louvain {
    /// Create a new Louvain detector with default settings.
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            max_levels: 32,
            min_modularity_gain: 1e-7,
            seed: 42,
        }
    }

    /// Set maximum sweeps per level.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Set maximum aggregation levels.
    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels.max(1);
        self
    }

    /// Phase 1: sweep-based local moving.
    fn local_moving(
        &self,
        wg: &WeightedGraph,
        resolution: f64,
        rng: &mut StdRng,
    ) -> (Vec<usize>, bool) {
        let mut communities: Vec<usize> = (0..wg.n).collect();
        let mut mover = LocalMover::new(wg, &communities, resolution);
        let mut order: Vec<usize> = (0..wg.n).collect();
        let mut any_improved = false;

        for _iter in 0..self.max_iter {
            order.shuffle(rng);
            let mut improved = false;
            for &node in &order {
                if mover.move_node(wg, &mut communities, node) {
                    improved = true;
                }
            }
            if !improved {
                break;
            }
            any_improved = true;
        }

        (communities, any_improved)
    }
}

impl Default for Louvain {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetection for Louvain {
    fn detect<N>(&self, graph: &UnGraph<N, f32>, resolution: f64) -> Result<Partition> {
        let base = prepare(graph, resolution)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut current = base.clone();
        // Original node -> node of the current aggregated graph.
        let mut node_to_agg: Vec<usize> = (0..base.n).collect();
        let mut prev_quality = f64::NEG_INFINITY;

        for _level in 0..self.max_levels {
            let (partition, improved) = self.local_moving(&current, resolution, &mut rng);
            if !improved {
                break;
            }

            let (partition, n_comms) = renumber(&partition);
            let quality = current.modularity(&partition, resolution);
            if quality - prev_quality < self.min_modularity_gain {
                break;
            }
            prev_quality = quality;

            for slot in node_to_agg.iter_mut() {
                *slot = partition[*slot];
            }
            // If no aggregation happened (each node is its own community), stop
            if n_comms == current.n {
                break;
            }
            current = current.aggregate(&partition, n_comms);
        }

        let (labels, _) = renumber(&node_to_agg);
        Ok(finish(&base, labels, resolution))
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::UnGraph;

    #[test]
    fn test_louvain_triangle() {
        // Simple triangle - should be one community
        let mut graph = UnGraph::<(), f32>::new_undirected();
        let n0 = graph.add_node(());
        let n1 = graph.add_node(());
        let n2 = graph.add_node(());

        let _ = graph.add_edge(n0, n1, 1.0);
        let _ = graph.add_edge(n1, n2, 1.0);
        let _ = graph.add_edge(n0, n2, 1.0);

        let communities = Louvain::new().detect(&graph, 1.0).unwrap().labels;

        assert_eq!(communities.len(), 3);
        // Triangle is well-connected, should be one community
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);
    }

    #[test]
    fn test_louvain_two_cliques() {
        // Two triangles connected by a single edge
        let mut graph = UnGraph::<(), f32>::new_undirected();

        // First clique
        let a0 = graph.add_node(());
        let a1 = graph.add_node(());
        let a2 = graph.add_node(());
        let _ = graph.add_edge(a0, a1, 1.0);
        let _ = graph.add_edge(a1, a2, 1.0);
        let _ = graph.add_edge(a0, a2, 1.0);

        // Second clique
        let b0 = graph.add_node(());
        let b1 = graph.add_node(());
        let b2 = graph.add_node(());
        let _ = graph.add_edge(b0, b1, 1.0);
        let _ = graph.add_edge(b1, b2, 1.0);
        let _ = graph.add_edge(b0, b2, 1.0);

        // Bridge
        let _ = graph.add_edge(a2, b0, 1.0);

        let partition = Louvain::new().detect(&graph, 1.0).unwrap();
        let communities = &partition.labels;

        assert_eq!(communities.len(), 6);

        // First clique should be in same community
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[1], communities[2]);

        // Second clique should be in same community
        assert_eq!(communities[3], communities[4]);
        assert_eq!(communities[4], communities[5]);

        // Two cliques should be in different communities
        assert_ne!(communities[0], communities[3]);
        assert!(partition.modularity > 0.3);
    }

    #[test]
    fn test_louvain_weights_matter() {
        // Square whose heavy edges pair {0,1} and {2,3}
        let mut graph = UnGraph::<(), f32>::new_undirected();
        let n: Vec<_> = (0..4).map(|_| graph.add_node(())).collect();
        let _ = graph.add_edge(n[0], n[1], 10.0);
        let _ = graph.add_edge(n[2], n[3], 10.0);
        let _ = graph.add_edge(n[1], n[2], 0.1);
        let _ = graph.add_edge(n[3], n[0], 0.1);

        let communities = Louvain::new().detect(&graph, 1.0).unwrap().labels;
        assert_eq!(communities[0], communities[1]);
        assert_eq!(communities[2], communities[3]);
        assert_ne!(communities[0], communities[2]);
    }

    #[test]
    fn test_louvain_empty_graph() {
        let graph = UnGraph::<(), f32>::new_undirected();
        let result = Louvain::new().detect(&graph, 1.0);
        assert!(matches!(result, Err(crate::Error::EmptyInput)));
    }

    #[test]
    fn test_louvain_disconnected() {
        // Two isolated nodes
        let mut graph = UnGraph::<(), f32>::new_undirected();
        let _ = graph.add_node(());
        let _ = graph.add_node(());

        let result = Louvain::new().detect(&graph, 1.0);
        assert!(matches!(result, Err(crate::Error::EmptyGraph)));
    }

    #[test]
    fn test_louvain_seeded() {
        let mut graph = UnGraph::<(), f32>::new_undirected();
        let nodes: Vec<_> = (0..10).map(|_| graph.add_node(())).collect();
        for i in 0..10 {
            let _ = graph.add_edge(nodes[i], nodes[(i + 1) % 10], 1.0);
        }
        let a = Louvain::new().with_seed(3).detect(&graph, 1.0).unwrap();
        let b = Louvain::new().with_seed(3).detect(&graph, 1.0).unwrap();
        assert_eq!(a.labels, b.labels);
    }
}
