//! Level-by-level hierarchy construction.
//!
//! A [`HierarchyStrategy`] proposes splits; the driver owns everything else:
//! ordering, filtering by `min_cluster_size`, id assignment, quality scoring,
//! the depth limit and final validation.
//!
//! ```text
//! level 0:  partition_root(corpus) ─▶ roots, largest first
//! level L:  for each node of size ≥ min_cluster_size (siblings in parallel)
//!             subdivide(node) ─▶ drop groups < min_cluster_size
//!                             ─▶ keep when ≥ 2 groups survive
//! ```

use super::density::DensityStrategy;
use super::multi_resolution::MultiResolution;
use super::node::{ClusterNode, NodeQuality};
use super::recursive::RecursiveStrategy;
use super::tree::ClusterTree;
use crate::community::{subtree_seed, CommunityDetection, Detector};
use crate::config::ClusteringConfig;
use crate::error::{Error, Result};
use crate::graph::{check_embeddings, couple_graph, CouplingMatrix, SimilarityGraph};
use crate::quality::QualityEvaluator;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Built-in hierarchy strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Corpus-wide partitions at several resolutions, one per level.
    #[default]
    MultiResolution,
    /// HDBSCAN on the embeddings, applied again inside each cluster.
    Density,
    /// Single-resolution detection, re-run inside incoherent clusters.
    Recursive,
}

impl StrategyKind {
    /// Name as used in configuration and on built trees.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::MultiResolution => "multi_resolution",
            StrategyKind::Density => "density",
            StrategyKind::Recursive => "recursive",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A proposed division of a document set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Split {
    /// Global document indices per group. Order and duplicates do not matter.
    pub groups: Vec<Vec<usize>>,
    /// Resolution of the partition behind the split, if any.
    pub resolution: Option<f64>,
    /// Modularity of that partition.
    pub modularity: Option<f64>,
}

impl Split {
    /// A split with no partition scores attached.
    pub fn new(groups: Vec<Vec<usize>>) -> Self {
        Self {
            groups,
            ..Self::default()
        }
    }

    /// Record the partition the split came from.
    pub fn with_partition(mut self, resolution: f64, modularity: f64) -> Self {
        self.resolution = Some(resolution);
        self.modularity = Some(modularity);
        self
    }

    /// Group `members` by their local labels; `None` labels are left out.
    pub fn from_labels<I>(members: &[usize], labels: I) -> Self
    where
        I: IntoIterator<Item = Option<usize>>,
    {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (&doc, label) in members.iter().zip(labels) {
            if let Some(label) = label {
                groups.entry(label).or_default().push(doc);
            }
        }
        Self::new(groups.into_values().collect())
    }
}

/// Shapes a hierarchy by proposing splits.
pub trait HierarchyStrategy: Sync {
    /// Name recorded on the built tree.
    fn name(&self) -> &'static str;

    /// Top-level groups. `None` (or no groups) yields a single root over the corpus.
    fn partition_root(&self, ctx: &BuildContext<'_>) -> Result<Option<Split>>;

    /// Children of `node`. `None` keeps it a leaf.
    fn subdivide(&self, ctx: &BuildContext<'_>, node: &ClusterNode) -> Result<Option<Split>>;
}

/// Inputs shared by every split of one build.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    embeddings: &'a [Vec<f32>],
    coupling: Option<&'a CouplingMatrix>,
    config: &'a ClusteringConfig,
    evaluator: &'a QualityEvaluator,
}

impl<'a> BuildContext<'a> {
    /// Corpus embeddings, indexed by document.
    pub fn embeddings(&self) -> &'a [Vec<f32>] {
        self.embeddings
    }

    /// Configuration of the running build.
    pub fn config(&self) -> &'a ClusteringConfig {
        self.config
    }

    /// Evaluator used to score every node.
    pub fn evaluator(&self) -> &'a QualityEvaluator {
        self.evaluator
    }

    /// Corpus size.
    pub fn n_documents(&self) -> usize {
        self.embeddings.len()
    }

    /// Similarity graph over the whole corpus, with coupling edges merged in.
    ///
    /// Unlike [`Self::subset_graph`], `k` is not clamped: `k >= N` is
    /// [`Error::InvalidParameter`].
    pub fn graph(&self) -> Result<SimilarityGraph> {
        let graph = self.config.graph.knn_builder().build(self.embeddings)?;
        let all: Vec<usize> = (0..self.n_documents()).collect();
        self.couple(graph, &all)
    }

    /// Similarity graph over `members` (node `i` is `members[i]`), with coupling
    /// edges merged in when a coupling matrix was supplied.
    ///
    /// Fewer than two members is [`Error::EmptyGraph`].
    pub fn subset_graph(&self, members: &[usize]) -> Result<SimilarityGraph> {
        if members.len() < 2 {
            return Err(Error::EmptyGraph);
        }
        let graph = self
            .config
            .graph
            .knn_builder()
            .build_subset(self.embeddings, members)?;
        self.couple(graph, members)
    }

    fn couple(&self, graph: SimilarityGraph, members: &[usize]) -> Result<SimilarityGraph> {
        let graph_config = &self.config.graph;
        match self.coupling {
            Some(coupling) if graph_config.coupling_weight > 0.0 => couple_graph(
                &graph,
                &coupling.restrict(members),
                graph_config.coupling_weight,
                graph_config.min_jaccard,
            ),
            _ => Ok(graph),
        }
    }

    /// Detector seeded with the run seed.
    pub fn detector(&self) -> Detector {
        self.config.detector.detector()
    }

    /// Detector seeded for the subtree under `id`.
    pub fn detector_for(&self, id: &str) -> Detector {
        self.detector()
            .with_seed(subtree_seed(self.config.detector.seed, id))
    }
}

/// Builds a [`ClusterTree`] with the configured strategy.
#[derive(Debug, Clone, Default)]
pub struct HierarchyBuilder {
    config: ClusteringConfig,
}

impl HierarchyBuilder {
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for an invalid configuration.
    pub fn new(config: ClusteringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Build the tree over `embeddings`, optionally mixing in citation coupling.
    pub fn build(&self, embeddings: &[Vec<f32>], coupling: Option<&CouplingMatrix>) -> Result<ClusterTree> {
        let _ = check_embeddings(embeddings)?;
        let evaluator = self
            .config
            .quality
            .evaluator(embeddings, self.config.detector.seed)?;
        self.build_with_evaluator(embeddings, coupling, &evaluator)
    }

    /// Like [`Self::build`], reusing an evaluator over the same embeddings.
    #[instrument(skip_all, fields(strategy = %self.config.hierarchy.strategy, n = embeddings.len()))]
    pub fn build_with_evaluator(
        &self,
        embeddings: &[Vec<f32>],
        coupling: Option<&CouplingMatrix>,
        evaluator: &QualityEvaluator,
    ) -> Result<ClusterTree> {
        let ctx = self.context(embeddings, coupling, evaluator)?;
        match self.config.hierarchy.strategy {
            StrategyKind::MultiResolution => {
                let strategy = MultiResolution::fit(&ctx)?;
                grow(&ctx, &strategy)
            }
            StrategyKind::Density => grow(&ctx, &DensityStrategy),
            StrategyKind::Recursive => grow(&ctx, &RecursiveStrategy),
        }
    }

    /// Build with a caller-supplied strategy.
    pub fn build_with<S: HierarchyStrategy>(
        &self,
        embeddings: &[Vec<f32>],
        coupling: Option<&CouplingMatrix>,
        strategy: &S,
    ) -> Result<ClusterTree> {
        let _ = check_embeddings(embeddings)?;
        let evaluator = self
            .config
            .quality
            .evaluator(embeddings, self.config.detector.seed)?;
        let ctx = self.context(embeddings, coupling, &evaluator)?;
        grow(&ctx, strategy)
    }

    fn context<'a>(
        &'a self,
        embeddings: &'a [Vec<f32>],
        coupling: Option<&'a CouplingMatrix>,
        evaluator: &'a QualityEvaluator,
    ) -> Result<BuildContext<'a>> {
        let _ = check_embeddings(embeddings)?;
        if evaluator.n_documents() != embeddings.len() {
            return Err(Error::DocumentCountMismatch {
                left: embeddings.len(),
                right: evaluator.n_documents(),
            });
        }
        if let Some(coupling) = coupling {
            if coupling.n_documents() != embeddings.len() {
                return Err(Error::DocumentCountMismatch {
                    left: embeddings.len(),
                    right: coupling.n_documents(),
                });
            }
        }
        Ok(BuildContext {
            embeddings,
            coupling,
            config: &self.config,
            evaluator,
        })
    }
}

/// Run `strategy` level by level.
#[instrument(skip_all, fields(strategy = strategy.name()))]
pub(crate) fn grow<S: HierarchyStrategy>(ctx: &BuildContext<'_>, strategy: &S) -> Result<ClusterTree> {
    let hierarchy = &ctx.config.hierarchy;
    let n = ctx.n_documents();

    let (mut root_groups, resolution, modularity) = match strategy.partition_root(ctx)? {
        Some(split) => (order_groups(split.groups), split.resolution, split.modularity),
        None => (Vec::new(), None, None),
    };
    if root_groups.is_empty() {
        warn!(n, "no top-level groups; using a single root");
        root_groups.push((0..n).collect());
    }

    let mut nodes = Vec::new();
    let mut roots = Vec::with_capacity(root_groups.len());
    for (i, docs) in root_groups.into_iter().enumerate() {
        let quality = NodeQuality {
            resolution,
            modularity,
            ..ctx.evaluator.node_quality(&docs)
        };
        roots.push(nodes.len());
        nodes.push(ClusterNode::new(i.to_string(), 0, None, docs).with_quality(quality));
    }
    info!(roots = roots.len(), "top level built");

    let mut frontier = roots.clone();
    for level in 1..hierarchy.max_levels {
        let candidates: Vec<usize> = frontier
            .iter()
            .copied()
            .filter(|&slot| nodes[slot].size() >= hierarchy.min_cluster_size)
            .collect();
        if candidates.is_empty() {
            break;
        }
        let splits = subdivide_all(ctx, strategy, &nodes, &candidates)?;

        let mut next = Vec::new();
        for (slot, split) in candidates.into_iter().zip(splits) {
            let Some(split) = split else {
                continue;
            };
            let proposed = split.groups.len();
            let children = accept_children(split.groups, nodes[slot].size(), hierarchy.min_cluster_size);
            if children.len() < proposed {
                debug!(
                    node = nodes[slot].id(),
                    dropped = proposed - children.len(),
                    "child groups dropped (empty, undersized or whole parent)"
                );
            }
            if children.len() < 2 {
                debug!(node = nodes[slot].id(), "degenerate split, kept as leaf");
                continue;
            }
            let parent_id = nodes[slot].id().to_string();
            for (j, docs) in children.into_iter().enumerate() {
                let quality = NodeQuality {
                    resolution: split.resolution,
                    modularity: split.modularity,
                    ..ctx.evaluator.node_quality(&docs)
                };
                let child = nodes.len();
                nodes.push(
                    ClusterNode::new(format!("{parent_id}.{j}"), level, Some(parent_id.clone()), docs)
                        .with_quality(quality),
                );
                nodes[slot].children.push(child);
                next.push(child);
            }
        }
        debug!(level, clusters = next.len(), "level built");
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let tree = ClusterTree::from_parts(nodes, roots, n, strategy.name())?;
    info!(
        clusters = tree.total_clusters(),
        levels = tree.max_depth(),
        "hierarchy built"
    );
    Ok(tree)
}

fn subdivide_all<S: HierarchyStrategy>(
    ctx: &BuildContext<'_>,
    strategy: &S,
    nodes: &[ClusterNode],
    candidates: &[usize],
) -> Result<Vec<Option<Split>>> {
    let run = |&slot: &usize| strategy.subdivide(ctx, &nodes[slot]);

    #[cfg(feature = "parallel")]
    let splits = candidates.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let splits = candidates.iter().map(run).collect();
    splits
}

/// Sort and dedup each group, drop empty ones, order by size (descending) and
/// then smallest document.
fn order_groups(groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = groups
        .into_iter()
        .map(|mut g| {
            g.sort_unstable();
            g.dedup();
            g
        })
        .filter(|g| !g.is_empty())
        .collect();
    groups.sort_by_key(|g| (Reverse(g.len()), g[0]));
    groups
}

/// Groups that survive as children: at least `min_cluster_size` documents and
/// strictly smaller than the parent.
fn accept_children(groups: Vec<Vec<usize>>, parent_size: usize, min_cluster_size: usize) -> Vec<Vec<usize>> {
    order_groups(groups)
        .into_iter()
        .filter(|g| g.len() >= min_cluster_size && g.len() < parent_size)
        .collect()
}
