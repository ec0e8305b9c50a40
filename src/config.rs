//! Clustering configuration.
//!
//! Every field has a default, so an empty TOML document is a valid configuration:
//!
//! ```toml
//! [graph]
//! k = 20
//! metric = "cosine"
//!
//! [detector]
//! algorithm = "leiden"
//! seed = 7
//!
//! [hierarchy]
//! strategy = "recursive"
//! min_cluster_size = 25
//! ```

use crate::cluster::{ClusterSelection, Hdbscan};
use crate::community::{Detector, DetectorKind, ResolutionSelector};
use crate::error::{Error, Result};
use crate::graph::{CouplingMatrixBuilder, KnnGraphBuilder, Metric, WeightFunction};
use crate::hierarchy::StrategyKind;
use crate::quality::QualityEvaluator;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master configuration for stream discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Similarity and coupling graph settings
    #[serde(default)]
    pub graph: GraphConfig,

    /// Community detection settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Resolution sweep settings
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Hierarchy construction settings
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Quality report settings
    #[serde(default)]
    pub quality: QualityConfig,
}

impl ClusteringConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check every section; the first offending field is reported.
    pub fn validate(&self) -> Result<()> {
        self.graph.validate()?;
        self.detector.validate()?;
        self.resolution.validate()?;
        self.hierarchy.validate()?;
        self.quality.validate()
    }
}

/// Similarity and coupling graph configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Neighbors per document in the kNN graph
    #[serde(default = "default_k")]
    pub k: usize,

    /// Embedding distance
    #[serde(default)]
    pub metric: Metric,

    /// Edge weights of the kNN graph
    #[serde(default)]
    pub weight_fn: WeightFunction,

    /// Multiplier for coupling Jaccard added to graph edges (0 disables the hybrid graph)
    #[serde(default = "default_coupling_weight")]
    pub coupling_weight: f32,

    /// Minimum Jaccard for a coupling-only pair to become an edge
    #[serde(default = "default_min_jaccard")]
    pub min_jaccard: f64,

    /// Minimum shared references for a pair to be coupled
    #[serde(default = "default_min_shared")]
    pub min_shared: usize,

    /// References cited by more documents than this are ignored
    #[serde(default)]
    pub max_postings: Option<usize>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            metric: Metric::default(),
            weight_fn: WeightFunction::default(),
            coupling_weight: default_coupling_weight(),
            min_jaccard: default_min_jaccard(),
            min_shared: default_min_shared(),
            max_postings: None,
        }
    }
}

impl GraphConfig {
    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::invalid("graph.k", "must be >= 1"));
        }
        if !(self.coupling_weight.is_finite() && self.coupling_weight >= 0.0) {
            return Err(Error::invalid("graph.coupling_weight", "must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&self.min_jaccard) {
            return Err(Error::invalid("graph.min_jaccard", "must lie in [0, 1]"));
        }
        if self.min_shared == 0 {
            return Err(Error::invalid("graph.min_shared", "must be >= 1"));
        }
        if matches!(self.max_postings, Some(p) if p < 2) {
            return Err(Error::invalid("graph.max_postings", "must be >= 2"));
        }
        Ok(())
    }

    /// kNN builder for these settings.
    pub fn knn_builder(&self) -> KnnGraphBuilder {
        KnnGraphBuilder::new(self.k)
            .with_metric(self.metric)
            .with_weight_fn(self.weight_fn)
    }

    /// Coupling builder for these settings.
    pub fn coupling_builder(&self) -> CouplingMatrixBuilder {
        let builder = CouplingMatrixBuilder::new().with_min_shared(self.min_shared);
        match self.max_postings {
            Some(limit) => builder.with_max_postings(limit),
            None => builder,
        }
    }
}

fn default_k() -> usize {
    15
}
fn default_coupling_weight() -> f32 {
    1.0
}
fn default_min_jaccard() -> f64 {
    0.05
}
fn default_min_shared() -> usize {
    1
}

/// Community detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Modularity optimizer
    #[serde(default)]
    pub algorithm: DetectorKind,

    /// Run seed; subtrees derive their own from it
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Iteration cap per local moving phase
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            algorithm: DetectorKind::default(),
            seed: default_seed(),
            max_iter: default_max_iter(),
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::invalid("detector.max_iter", "must be >= 1"));
        }
        Ok(())
    }

    /// Detector for these settings, seeded with the run seed.
    pub fn detector(&self) -> Detector {
        Detector::new(self.algorithm, self.seed, self.max_iter)
    }
}

fn default_seed() -> u64 {
    42
}
fn default_max_iter() -> usize {
    100
}

/// Resolution sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Lowest swept resolution
    #[serde(default = "default_resolution_min")]
    pub min: f64,

    /// Highest swept resolution
    #[serde(default = "default_resolution_max")]
    pub max: f64,

    /// Number of evenly spaced samples
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,

    /// ARI at or above which a sample duplicates the previous level
    #[serde(default = "default_redundancy_threshold")]
    pub redundancy_threshold: f64,

    /// Maximum levels kept
    #[serde(default = "default_resolution_levels")]
    pub max_levels: usize,

    /// Samples at or below this modularity are discarded
    #[serde(default)]
    pub min_modularity: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            min: default_resolution_min(),
            max: default_resolution_max(),
            n_samples: default_n_samples(),
            redundancy_threshold: default_redundancy_threshold(),
            max_levels: default_resolution_levels(),
            min_modularity: 0.0,
        }
    }
}

impl ResolutionConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min >= 0.0) {
            return Err(Error::invalid("resolution.min", "bounds must be finite and >= 0"));
        }
        if self.min > self.max {
            return Err(Error::invalid("resolution.max", "must be >= resolution.min"));
        }
        if self.n_samples == 0 {
            return Err(Error::invalid("resolution.n_samples", "must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.redundancy_threshold) {
            return Err(Error::invalid("resolution.redundancy_threshold", "must lie in [0, 1]"));
        }
        if self.max_levels == 0 {
            return Err(Error::invalid("resolution.max_levels", "must be >= 1"));
        }
        Ok(())
    }

    /// Selector for these settings.
    pub fn selector(&self) -> ResolutionSelector {
        ResolutionSelector::new()
            .with_range(self.min, self.max)
            .with_samples(self.n_samples)
            .with_redundancy_threshold(self.redundancy_threshold)
            .with_max_levels(self.max_levels)
            .with_min_modularity(self.min_modularity)
    }
}

fn default_resolution_min() -> f64 {
    0.1
}
fn default_resolution_max() -> f64 {
    2.0
}
fn default_n_samples() -> usize {
    20
}
fn default_redundancy_threshold() -> f64 {
    0.95
}
fn default_resolution_levels() -> usize {
    5
}

/// Hierarchy construction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Strategy that shapes the tree
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Nodes smaller than this are never subdivided; child groups smaller than this are dropped
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Maximum tree depth (levels)
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,

    /// Resolution for single-resolution detection
    #[serde(default = "default_fixed_resolution")]
    pub fixed_resolution: f64,

    /// Recursive strategy: nodes at or above this cohesion are not split
    #[serde(default = "default_cohesion_threshold")]
    pub cohesion_threshold: f64,

    /// Recursive strategy: only nodes of at least `split_factor × min_cluster_size` are split
    #[serde(default = "default_split_factor")]
    pub split_factor: usize,

    /// Density strategy settings
    #[serde(default)]
    pub density: DensityConfig,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            min_cluster_size: default_min_cluster_size(),
            max_levels: default_max_levels(),
            fixed_resolution: default_fixed_resolution(),
            cohesion_threshold: default_cohesion_threshold(),
            split_factor: default_split_factor(),
            density: DensityConfig::default(),
        }
    }
}

impl HierarchyConfig {
    fn validate(&self) -> Result<()> {
        if self.min_cluster_size == 0 {
            return Err(Error::invalid("hierarchy.min_cluster_size", "must be >= 1"));
        }
        if self.max_levels == 0 {
            return Err(Error::invalid("hierarchy.max_levels", "must be >= 1"));
        }
        if !(self.fixed_resolution.is_finite() && self.fixed_resolution >= 0.0) {
            return Err(Error::invalid("hierarchy.fixed_resolution", "must be finite and >= 0"));
        }
        if !(-1.0..=1.0).contains(&self.cohesion_threshold) {
            return Err(Error::invalid("hierarchy.cohesion_threshold", "must lie in [-1, 1]"));
        }
        if self.split_factor == 0 {
            return Err(Error::invalid("hierarchy.split_factor", "must be >= 1"));
        }
        if self.density.min_samples == Some(0) {
            return Err(Error::invalid("hierarchy.density.min_samples", "must be >= 1"));
        }
        Ok(())
    }
}

fn default_min_cluster_size() -> usize {
    10
}
fn default_max_levels() -> usize {
    3
}
fn default_fixed_resolution() -> f64 {
    1.0
}
fn default_cohesion_threshold() -> f64 {
    0.3
}
fn default_split_factor() -> usize {
    3
}

/// HDBSCAN settings for the density strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Neighbor count for core distances (defaults to `min_cluster_size` when unset)
    #[serde(default = "default_min_samples")]
    pub min_samples: Option<usize>,

    /// Flat cluster selection
    #[serde(default)]
    pub selection: ClusterSelection,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            selection: ClusterSelection::default(),
        }
    }
}

impl DensityConfig {
    /// HDBSCAN clusterer for these settings.
    ///
    /// HDBSCAN needs clusters of at least two points, so a `min_cluster_size`
    /// of 1 runs as 2.
    pub fn hdbscan(&self, min_cluster_size: usize, metric: Metric) -> Hdbscan {
        let clusterer = Hdbscan::new(min_cluster_size.max(2))
            .with_metric(metric)
            .with_selection(self.selection);
        match self.min_samples {
            Some(min_samples) => clusterer.with_min_samples(min_samples),
            None => clusterer,
        }
    }
}

fn default_min_samples() -> Option<usize> {
    Some(5)
}

/// Quality report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Silhouette is computed on a seeded sample of at most this many documents
    #[serde(default = "default_silhouette_sample")]
    pub silhouette_sample: usize,

    /// Level metrics need at least this many covered documents
    #[serde(default = "default_min_labeled")]
    pub min_labeled: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            silhouette_sample: default_silhouette_sample(),
            min_labeled: default_min_labeled(),
        }
    }
}

impl QualityConfig {
    /// Evaluator over `embeddings` with these settings.
    pub fn evaluator(&self, embeddings: &[Vec<f32>], seed: u64) -> Result<QualityEvaluator> {
        Ok(QualityEvaluator::new(embeddings)?
            .with_silhouette_sample(self.silhouette_sample)
            .with_min_labeled(self.min_labeled)
            .with_seed(seed))
    }

    fn validate(&self) -> Result<()> {
        if self.silhouette_sample < 2 {
            return Err(Error::invalid("quality.silhouette_sample", "must be >= 2"));
        }
        if self.min_labeled < 2 {
            return Err(Error::invalid("quality.min_labeled", "must be >= 2"));
        }
        Ok(())
    }
}

fn default_silhouette_sample() -> usize {
    5000
}
fn default_min_labeled() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClusteringConfig::default();
        assert_eq!(config.graph.k, 15);
        assert_eq!(config.graph.metric, Metric::Cosine);
        assert_eq!(config.detector.algorithm, DetectorKind::Leiden);
        assert_eq!(config.detector.seed, 42);
        assert_eq!(config.resolution.n_samples, 20);
        assert!((config.resolution.redundancy_threshold - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.resolution.max_levels, 5);
        assert_eq!(config.hierarchy.strategy, StrategyKind::MultiResolution);
        assert_eq!(config.hierarchy.min_cluster_size, 10);
        assert!((config.hierarchy.cohesion_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.hierarchy.split_factor, 3);
        assert_eq!(config.quality.min_labeled, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ClusteringConfig::from_toml_str("").unwrap();
        assert_eq!(config.graph.k, 15);
        assert_eq!(config.hierarchy.max_levels, 3);
    }

    #[test]
    fn test_partial_toml() {
        let config = ClusteringConfig::from_toml_str(
            r#"
            [graph]
            k = 20
            metric = "euclidean"
            max_postings = 500

            [detector]
            algorithm = "louvain"

            [hierarchy]
            strategy = "density"

            [hierarchy.density]
            selection = "leaf"
            "#,
        )
        .unwrap();
        assert_eq!(config.graph.k, 20);
        assert_eq!(config.graph.metric, Metric::Euclidean);
        assert_eq!(config.graph.max_postings, Some(500));
        assert_eq!(config.detector.algorithm, DetectorKind::Louvain);
        assert_eq!(config.detector.seed, 42);
        assert_eq!(config.hierarchy.strategy, StrategyKind::Density);
        assert_eq!(config.hierarchy.density.selection, ClusterSelection::Leaf);
        assert_eq!(config.hierarchy.density.min_samples, Some(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ClusteringConfig::from_toml_str("[hierarchy]\nmin_cluster_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "hierarchy.min_cluster_size", .. }));

        let err = ClusteringConfig::from_toml_str("[resolution]\nmin = 3.0\nmax = 1.0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_singleton_clusters_allowed() {
        let config = ClusteringConfig::from_toml_str("[hierarchy]\nmin_cluster_size = 1\n").unwrap();
        assert_eq!(config.hierarchy.min_cluster_size, 1);
        let labels = config
            .hierarchy
            .density
            .hdbscan(1, Metric::Euclidean)
            .fit(&[vec![0.0], vec![0.1], vec![0.2]])
            .unwrap();
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ClusteringConfig::from_toml_str("[graph\nk = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = ClusteringConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ClusteringConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.graph.k, parsed.graph.k);
        assert_eq!(config.hierarchy.strategy, parsed.hierarchy.strategy);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ClusteringConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
