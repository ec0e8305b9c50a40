//! Community detection traits.

use super::weighted::WeightedGraph;
use crate::error::{Error, Result};
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

/// Result of one community detection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    /// Community of each node, consecutive from 0 in order of first appearance.
    pub labels: Vec<usize>,
    /// Newman modularity (γ = 1) of the partition.
    pub modularity: f64,
    /// Value of the optimized objective at `resolution`.
    pub quality: f64,
    /// Resolution the partition was optimized for.
    pub resolution: f64,
}

impl Partition {
    /// Number of distinct communities.
    pub fn n_communities(&self) -> usize {
        self.labels.iter().copied().max().map_or(0, |c| c + 1)
    }

    /// Members of each community, in label order.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.n_communities()];
        for (node, &label) in self.labels.iter().enumerate() {
            groups[label].push(node);
        }
        groups
    }
}

/// Trait for community detection algorithms.
pub trait CommunityDetection {
    /// Partition `graph` by optimizing modularity at `resolution`.
    ///
    /// Higher resolution favors more, smaller communities.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] for a graph without nodes
    /// - [`Error::EmptyGraph`] for a graph without edges
    /// - [`Error::InvalidParameter`] for a negative or non-finite resolution
    fn detect<N>(&self, graph: &UnGraph<N, f32>, resolution: f64) -> Result<Partition>;

    /// Seed controlling tie-breaking and visiting order.
    fn seed(&self) -> u64;

    /// Same detector with a different seed.
    fn with_seed(self, seed: u64) -> Self
    where
        Self: Sized;
}

/// Shared entry checks; returns the weighted view of `graph`.
pub(crate) fn prepare<N>(graph: &UnGraph<N, f32>, resolution: f64) -> Result<WeightedGraph> {
    if !(resolution.is_finite() && resolution >= 0.0) {
        return Err(Error::invalid(
            "resolution",
            format!("must be finite and >= 0, got {resolution}"),
        ));
    }
    if graph.node_count() == 0 {
        return Err(Error::EmptyInput);
    }
    if graph.edge_count() == 0 {
        return Err(Error::EmptyGraph);
    }
    let wg = WeightedGraph::from_petgraph(graph);
    if wg.total_weight <= 0.0 {
        return Err(Error::EmptyGraph);
    }
    Ok(wg)
}

/// Package final labels with their scores.
pub(crate) fn finish(wg: &WeightedGraph, labels: Vec<usize>, resolution: f64) -> Partition {
    Partition {
        modularity: wg.modularity(&labels, 1.0),
        quality: wg.modularity(&labels, resolution),
        labels,
        resolution,
    }
}
