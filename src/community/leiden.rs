//! Leiden algorithm for community detection.
//!
//! An improvement over Louvain that guarantees well-connected communities.
//!
//! ## The Leiden Algorithm (Traag et al. 2019)
//!
//! Leiden fixes Louvain's fundamental flaw: Louvain can create disconnected
//! communities because it never re-examines decisions within a community.
//!
//! ### Three Phases
//!
//! 1. **Local Moving**: Like Louvain, greedily move nodes to best community,
//!    but driven by a queue: only neighbors of moved nodes are revisited.
//!
//! 2. **Refinement**: Within each community from phase 1, split off every
//!    part that is not connected to the rest through internal edges.
//!
//! 3. **Aggregation**: Contract the *refined* communities into single nodes,
//!    but start the next level from the *unrefined* assignment, so a community
//!    can still be revisited as several connected pieces.
//!
//! ### Why Refinement Matters
//!
//! ```text
//! Louvain can produce:        Leiden guarantees:
//!     A---B                       A---B
//!         |                           |
//!     C   D                       C   D
//!                                 (C in separate community)
//! [A,B,C,D] all in one         [A,B,D] connected, [C] alone
//! community despite C
//! being disconnected!
//! ```
//!
//! ## Determinism
//!
//! The initial node order of each local moving phase is a seeded shuffle, so the
//! same graph, resolution and seed always give the same labels.
//!
//! ## References
//!
//! Traag, Waltman, van Eck (2019). "From Louvain to Leiden: guaranteeing
//! well-connected communities." Scientific Reports 9, 5233.

use super::traits::{finish, prepare, CommunityDetection, Partition};
use super::weighted::{renumber, split_disconnected, LocalMover, WeightedGraph};
use crate::error::Result;
use petgraph::graph::UnGraph;
use rand::prelude::*;
use std::collections::VecDeque;

/// Leiden community detection algorithm.
///
/// Guarantees well-connected communities through a refinement phase
/// that Louvain lacks.
#[derive(Debug, Clone)]
pub struct Leiden {
    /// Maximum node visits per local moving phase, as a multiple of the node count.
    max_iter: usize,
    /// Maximum aggregation levels.
    max_levels: usize,
    /// Random seed for visiting order.
    seed: u64,
}

impl Leiden {
    /// Create a new Leiden detector.
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            max_levels: 32,
            seed: 42,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Set maximum aggregation levels.
    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels.max(1);
        self
    }
}

impl Default for Leiden {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunityDetection for Leiden {
    fn detect<N>(&self, graph: &UnGraph<N, f32>, resolution: f64) -> Result<Partition> {
        let base = prepare(graph, resolution)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut wg = base.clone();
        let mut membership: Vec<usize> = (0..wg.n).collect();
        // Original node -> node of the current aggregated graph.
        let mut node_to_agg: Vec<usize> = (0..wg.n).collect();

        for _level in 0..self.max_levels {
            // Phase 1: Local moving
            self.local_moving_phase(&wg, &mut membership, resolution, &mut rng);

            // Phase 2: Refinement (the key Leiden innovation)
            let (refined, n_refined) = split_disconnected(&wg, &membership);
            if n_refined == wg.n {
                break;
            }

            // Phase 3: Aggregate on the refined partition, seeded with the unrefined one.
            let aggregated = wg.aggregate(&refined, n_refined);
            let mut agg_membership = vec![0; n_refined];
            for (node, &piece) in refined.iter().enumerate() {
                agg_membership[piece] = membership[node];
            }
            for slot in node_to_agg.iter_mut() {
                *slot = refined[*slot];
            }
            membership = renumber(&agg_membership).0;
            wg = aggregated;
        }

        let labels: Vec<usize> = node_to_agg.iter().map(|&a| membership[a]).collect();
        // A final split on the input graph keeps the connectivity guarantee even when
        // the level cap stops aggregation early.
        let (labels, _) = split_disconnected(&base, &labels);
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

impl Leiden {
    /// Phase 1: queue-driven local moving.
    ///
    /// Every node is visited once in shuffled order; a node that moves re-enqueues
    /// its neighbors that now sit outside its new community.
    fn local_moving_phase(
        &self,
        wg: &WeightedGraph,
        membership: &mut [usize],
        resolution: f64,
        rng: &mut StdRng,
    ) -> bool {
        let mut mover = LocalMover::new(wg, membership, resolution);
        let mut order: Vec<usize> = (0..wg.n).collect();
        order.shuffle(rng);
        let mut queue: VecDeque<usize> = order.into();
        let mut in_queue = vec![true; wg.n];
        let budget = self.max_iter.saturating_mul(wg.n).max(wg.n);
        let mut visits = 0;
        let mut improved = false;

        while let Some(node) = queue.pop_front() {
            in_queue[node] = false;
            visits += 1;
            if mover.move_node(wg, membership, node) {
                improved = true;
                let community = membership[node];
                for &(neighbor, _) in &wg.adj[node] {
                    if !in_queue[neighbor] && membership[neighbor] != community {
                        queue.push_back(neighbor);
                        in_queue[neighbor] = true;
                    }
                }
            }
            if visits >= budget {
                break;
            }
        }

        improved
    }
}
