//! # canopy
//!
//! Hierarchical research-stream discovery: multi-level topical clusters over a
//! document corpus from embedding similarity and, when available, bibliographic
//! coupling.
//!
//! ```text
//! embeddings ─▶ kNN graph ─┐
//!                          ├─▶ community detection ─▶ ClusterTree ─▶ quality report
//! references ─▶ coupling ──┘     (or HDBSCAN)                      ─▶ comparison
//! ```
//!
//! Start with [`StreamDiscovery`] for the whole pipeline, or use the pieces:
//! [`graph`] for similarity and coupling graphs, [`community`] for Leiden and
//! Louvain with resolution selection, [`cluster`] for HDBSCAN, [`hierarchy`] for
//! the tree and its strategies, [`quality`] and [`compare`] for evaluation.
//!
//! Parallelism (rayon) is behind the default `parallel` feature; results do not
//! depend on the number of workers.

pub mod cluster;
pub mod community;
pub mod compare;
pub mod config;
pub mod discovery;
/// Error types used across `canopy`.
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod metrics;
pub mod quality;

pub use compare::{compare, HierarchyComparison, LevelAgreement};
pub use config::ClusteringConfig;
pub use discovery::{CitationSignal, Discovery, DocumentSet, StreamDiscovery};
pub use error::{Error, Result};
pub use hierarchy::{ClusterNode, ClusterTree, HierarchyBuilder, NodeQuality, StrategyKind};
pub use metrics::{ari, nmi};
pub use quality::{LevelQuality, QualityEvaluator};
