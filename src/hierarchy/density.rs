//! Density strategy: HDBSCAN all the way down.
//!
//! Documents HDBSCAN calls noise are left out of the split, so they stay in the
//! parent only (or, at the top, outside every root).

use super::builder::{BuildContext, HierarchyStrategy, Split};
use super::node::ClusterNode;
use crate::cluster::Hdbscan;
use crate::error::Result;
use tracing::debug;

/// Stateless; settings come from `hierarchy.density` and `graph.metric`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityStrategy;

fn clusterer(ctx: &BuildContext<'_>) -> Hdbscan {
    let config = ctx.config();
    config
        .hierarchy
        .density
        .hdbscan(config.hierarchy.min_cluster_size, config.graph.metric)
}

impl HierarchyStrategy for DensityStrategy {
    fn name(&self) -> &'static str {
        "density"
    }

    fn partition_root(&self, ctx: &BuildContext<'_>) -> Result<Option<Split>> {
        let labels = clusterer(ctx).fit(ctx.embeddings())?;
        let all: Vec<usize> = (0..ctx.n_documents()).collect();
        let split = Split::from_labels(&all, labels);
        let noise = ctx.n_documents() - split.groups.iter().map(Vec::len).sum::<usize>();
        debug!(clusters = split.groups.len(), noise, "top-level density clusters");
        Ok(Some(split))
    }

    fn subdivide(&self, ctx: &BuildContext<'_>, node: &ClusterNode) -> Result<Option<Split>> {
        let labels = clusterer(ctx).fit_subset(ctx.embeddings(), node.documents())?;
        Ok(Some(Split::from_labels(node.documents(), labels)))
    }
}
