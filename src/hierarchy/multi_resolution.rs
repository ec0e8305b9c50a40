//! Multi-resolution strategy.
//!
//! The resolution sweep picks a few corpus-wide partitions, coarse to fine.
//! Level `L` of the tree is partition `L` restricted to the parent's documents,
//! so every node is a real community of one global partition.

use super::builder::{BuildContext, HierarchyStrategy, Split};
use super::node::ClusterNode;
use crate::community::{CommunityDetection, Partition};
use crate::error::{Error, Result};
use tracing::{info, warn};

/// Corpus-wide partitions, one per tree level.
#[derive(Debug, Clone, Default)]
pub struct MultiResolution {
    levels: Vec<Partition>,
}

impl MultiResolution {
    /// Use precomputed partitions, coarsest first. Labels index the whole corpus.
    pub fn from_levels(levels: Vec<Partition>) -> Self {
        Self { levels }
    }

    /// Run the resolution sweep on the corpus graph.
    ///
    /// With no level surviving selection, falls back to one partition at
    /// `fixed_resolution`. A corpus without graph edges yields no levels, and
    /// the tree becomes a single root.
    pub(crate) fn fit(ctx: &BuildContext<'_>) -> Result<Self> {
        let graph = match ctx.graph() {
            Ok(graph) => graph,
            Err(Error::EmptyGraph) => {
                warn!("corpus too small for a similarity graph");
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };
        let detector = ctx.detector();
        let levels = match ctx.config().resolution.selector().select(&detector, &graph) {
            Ok(levels) if !levels.is_empty() => levels,
            Ok(_) => {
                let fixed = ctx.config().hierarchy.fixed_resolution;
                warn!(resolution = fixed, "no resolution selected, using the fixed resolution");
                vec![detector.detect(&graph, fixed)?]
            }
            Err(Error::EmptyGraph) => {
                warn!("similarity graph has no edges");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        info!(
            levels = levels.len(),
            resolutions = ?levels.iter().map(|p| p.resolution).collect::<Vec<_>>(),
            "resolution levels"
        );
        Ok(Self { levels })
    }

    /// Partitions ordered coarse to fine, one per resolution.
    pub fn levels(&self) -> &[Partition] {
        &self.levels
    }
}

fn restricted(partition: &Partition, documents: &[usize]) -> Split {
    let labels = documents
        .iter()
        .map(|&doc| partition.labels.get(doc).copied());
    Split::from_labels(documents, labels).with_partition(partition.resolution, partition.modularity)
}

impl HierarchyStrategy for MultiResolution {
    fn name(&self) -> &'static str {
        "multi_resolution"
    }

    fn partition_root(&self, ctx: &BuildContext<'_>) -> Result<Option<Split>> {
        let all: Vec<usize> = (0..ctx.n_documents()).collect();
        Ok(self.levels.first().map(|p| restricted(p, &all)))
    }

    fn subdivide(&self, _ctx: &BuildContext<'_>, node: &ClusterNode) -> Result<Option<Split>> {
        Ok(self
            .levels
            .get(node.level() + 1)
            .map(|p| restricted(p, node.documents())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusteringConfig;
    use crate::hierarchy::{HealthCheck, HierarchyBuilder};

    fn partition(labels: Vec<usize>, resolution: f64) -> Partition {
        Partition {
            labels,
            modularity: 0.4,
            quality: 0.4,
            resolution,
        }
    }

    fn embeddings(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![1.0, (i % 5) as f32, 0.2]).collect()
    }

    #[test]
    fn test_levels_are_restricted_partitions() {
        let coarse = partition(vec![0, 0, 0, 0, 0, 0, 1, 1, 1, 1], 0.5);
        // The fine partition straddles the coarse boundary at documents 5 and 6.
        let fine = partition(vec![0, 0, 1, 1, 1, 2, 2, 3, 3, 3], 1.5);
        let strategy = MultiResolution::from_levels(vec![coarse, fine]);

        let mut config = ClusteringConfig::default();
        config.hierarchy.min_cluster_size = 2;
        let tree = HierarchyBuilder::new(config)
            .unwrap()
            .build_with(&embeddings(10), None, &strategy)
            .unwrap();

        assert_eq!(tree.level_counts(), vec![2, 2]);
        assert_eq!(tree.node("0.0").unwrap().documents(), &[2, 3, 4]);
        assert_eq!(tree.node("0.1").unwrap().documents(), &[0, 1]);
        // Document 5 forms a singleton inside root 0 and stays only in the root.
        assert_eq!(tree.path_of(5).len(), 1);
        // Root 1 would keep a single group of three, so it stays a leaf.
        assert!(tree.node("1").unwrap().is_leaf());
        assert_eq!(tree.node("0.0").unwrap().quality().resolution, Some(1.5));
        assert_eq!(tree.node("1").unwrap().quality().resolution, Some(0.5));
        assert!(tree.is_healthy());
    }

    #[test]
    fn test_no_levels_gives_single_root() {
        let strategy = MultiResolution::default();
        let tree = HierarchyBuilder::default()
            .build_with(&embeddings(4), None, &strategy)
            .unwrap();
        assert_eq!(tree.total_clusters(), 1);
        assert_eq!(tree.node("0").unwrap().size(), 4);
    }
}
