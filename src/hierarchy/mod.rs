//! Research-stream hierarchies.
//!
//! A [`ClusterTree`] is a forest of nested document clusters. Roots partition
//! (part of) the corpus; each child holds a subset of its parent's documents,
//! and siblings never share a document.
//!
//! ```text
//! Level 0:   [0: 412 docs]              [1: 230 docs]        [2: 57 docs]
//!             /           \               /        \
//! Level 1: [0.0: 260]   [0.1: 140]   [1.0: 120]  [1.1: 98]
//!            /    \
//! Level 2: [0.0.0] [0.0.1]
//! ```
//!
//! Documents may be left uncovered below some level: a child group smaller than
//! `min_cluster_size` is dropped, and the density strategy leaves noise out.
//! [`ClusterTree::flatten_level`] marks those documents with `-1`.
//!
//! # Strategies
//!
//! | Strategy | Top level | Below |
//! |----------|-----------|-------|
//! | [`MultiResolution`] | coarsest selected partition | next finer partition, restricted to the parent |
//! | [`DensityStrategy`] | HDBSCAN on the corpus | HDBSCAN inside the parent |
//! | [`RecursiveStrategy`] | detection at a fixed resolution | detection inside large, incoherent parents |
//!
//! All three share one driver ([`HierarchyBuilder`]) that orders, filters, names
//! and validates the clusters. Custom strategies implement [`HierarchyStrategy`].
//!
//! # Example
//!
//! ```rust
//! use canopy::config::ClusteringConfig;
//! use canopy::hierarchy::{HierarchyBuilder, StrategyKind};
//!
//! let mut config = ClusteringConfig::default();
//! config.graph.k = 4;
//! config.hierarchy.strategy = StrategyKind::Recursive;
//! config.hierarchy.min_cluster_size = 3;
//!
//! let mut embeddings = Vec::new();
//! for i in 0..8 {
//!     embeddings.push(vec![1.0, 0.01 * i as f32, 0.0]);
//!     embeddings.push(vec![0.0, 0.01 * i as f32, 1.0]);
//! }
//!
//! let tree = HierarchyBuilder::new(config).unwrap().build(&embeddings, None).unwrap();
//! assert!(tree.roots().count() >= 2);
//! assert_eq!(tree.summary().covered_documents, 16);
//! ```

mod builder;
mod density;
mod multi_resolution;
mod node;
mod recursive;
mod tree;
mod validate;

pub use builder::{BuildContext, HierarchyBuilder, HierarchyStrategy, Split, StrategyKind};
pub use density::DensityStrategy;
pub use multi_resolution::MultiResolution;
pub use node::{ClusterNode, NodeQuality};
pub use recursive::RecursiveStrategy;
pub use tree::{ClusterTree, TreeSummary};
pub use validate::{
    validate_tree_structure, HealthCheck, HealthReport, Severity, ValidationIssue, ValidationReport,
};
