//! Recursive strategy: detect once, then re-detect inside incoherent clusters.
//!
//! A node is split again only when it is large (at least
//! `split_factor × min_cluster_size` documents) and loose (cohesion below
//! `cohesion_threshold`). Each subtree runs with its own derived seed.

use super::builder::{BuildContext, HierarchyStrategy, Split};
use super::node::ClusterNode;
use crate::community::{CommunityDetection, Detector};
use crate::error::{Error, Result};
use crate::graph::SimilarityGraph;
use tracing::debug;

/// Single-resolution detection, repeated inside large incoherent clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveStrategy;

/// Detect communities on `graph`, whose node `i` is `members[i]`, at the fixed
/// resolution. A set without graph edges has no split.
fn detect(
    ctx: &BuildContext<'_>,
    detector: &Detector,
    members: &[usize],
    graph: Result<SimilarityGraph>,
) -> Result<Option<Split>> {
    let graph = match graph {
        Ok(graph) => graph,
        Err(Error::EmptyGraph) => return Ok(None),
        Err(e) => return Err(e),
    };
    let resolution = ctx.config().hierarchy.fixed_resolution;
    let partition = match detector.detect(&graph, resolution) {
        Ok(partition) => partition,
        Err(Error::EmptyGraph) => return Ok(None),
        Err(e) => return Err(e),
    };
    let labels = partition.labels.iter().map(|&l| Some(l));
    Ok(Some(
        Split::from_labels(members, labels).with_partition(partition.resolution, partition.modularity),
    ))
}

impl HierarchyStrategy for RecursiveStrategy {
    fn name(&self) -> &'static str {
        "recursive"
    }

    fn partition_root(&self, ctx: &BuildContext<'_>) -> Result<Option<Split>> {
        let all: Vec<usize> = (0..ctx.n_documents()).collect();
        detect(ctx, &ctx.detector(), &all, ctx.graph())
    }

    fn subdivide(&self, ctx: &BuildContext<'_>, node: &ClusterNode) -> Result<Option<Split>> {
        let hierarchy = &ctx.config().hierarchy;
        if node.size() < hierarchy.split_factor * hierarchy.min_cluster_size {
            return Ok(None);
        }
        match node.quality().cohesion {
            Some(cohesion) if cohesion < hierarchy.cohesion_threshold => {
                debug!(node = node.id(), cohesion, "splitting incoherent cluster");
                let members = node.documents();
                detect(ctx, &ctx.detector_for(node.id()), members, ctx.subset_graph(members))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusteringConfig;
    use crate::hierarchy::{HierarchyBuilder, StrategyKind};

    /// Twelve documents around each of four nearly orthogonal directions.
    fn corpus() -> Vec<Vec<f32>> {
        let axes = [
            [1.0, 0.05, 0.0, 0.0],
            [0.05, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.05],
            [0.0, 0.0, 0.05, 1.0],
        ];
        let mut data = Vec::new();
        for axis in axes {
            for i in 0..12 {
                let jitter = i as f32 * 0.002;
                data.push(axis.iter().map(|v| v + jitter).collect());
            }
        }
        data
    }

    fn config(cohesion_threshold: f64) -> ClusteringConfig {
        let mut config = ClusteringConfig::default();
        config.graph.k = 5;
        config.hierarchy.strategy = StrategyKind::Recursive;
        config.hierarchy.min_cluster_size = 4;
        config.hierarchy.split_factor = 2;
        config.hierarchy.cohesion_threshold = cohesion_threshold;
        config
    }

    #[test]
    fn test_tight_roots_are_not_split() {
        let tree = HierarchyBuilder::new(config(-1.0)).unwrap().build(&corpus(), None).unwrap();
        assert_eq!(tree.strategy(), "recursive");
        assert!(tree.roots().count() >= 2);
        assert_eq!(tree.max_depth(), 1);
    }

    #[test]
    fn test_small_nodes_are_never_split() {
        let mut config = config(1.0);
        config.hierarchy.split_factor = 100;
        let tree = HierarchyBuilder::new(config).unwrap().build(&corpus(), None).unwrap();
        assert_eq!(tree.max_depth(), 1);
    }

    #[test]
    fn test_split_children_nest_in_parents() {
        let tree = HierarchyBuilder::new(config(1.0)).unwrap().build(&corpus(), None).unwrap();
        for node in tree.iter() {
            if let Some(parent) = tree.parent_of(node) {
                assert!(node.documents().iter().all(|d| parent.contains(*d)));
                assert!(parent.size() >= 8);
            }
        }
    }
}
