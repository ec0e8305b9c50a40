//! End-to-end stream discovery.
//!
//! ```text
//! DocumentSet ─┬─ embeddings ───────────────────────────┐
//!              └─ references ─▶ coupling (if any signal) ┴─▶ HierarchyBuilder
//!                                                               │
//!                               Discovery { tree, levels } ◀── QualityEvaluator
//! ```
//!
//! Without references, or when no document cites anything, the tree is built
//! from embedding similarity alone.

use crate::compare::{compare, HierarchyComparison};
use crate::config::ClusteringConfig;
use crate::error::{Error, Result};
use crate::graph::{check_embeddings, CouplingOutcome};
use crate::hierarchy::{ClusterTree, HierarchyBuilder};
use crate::quality::LevelQuality;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Input corpus: one embedding per document, optionally with reference lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    /// One embedding per document, all of the same dimension.
    pub embeddings: Vec<Vec<f32>>,
    /// Cited reference ids per document, aligned with `embeddings`.
    #[serde(default)]
    pub references: Option<Vec<Vec<String>>>,
}

impl DocumentSet {
    /// Corpus without reference lists.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            embeddings,
            references: None,
        }
    }

    /// Attach reference lists, one per document.
    pub fn with_references(mut self, references: Vec<Vec<String>>) -> Self {
        self.references = Some(references);
        self
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// What the citation data contributed to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CitationSignal {
    /// No reference lists were supplied.
    NotProvided,
    /// Reference lists were supplied but no document cites anything.
    Absent,
    /// Coupling was used; `pairs` is the number of coupled document pairs.
    Present { pairs: usize },
}

/// Result of one discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    /// The validated cluster tree.
    pub tree: ClusterTree,
    /// Quality of each tree level, top first.
    pub levels: Vec<LevelQuality>,
    /// Whether citation coupling shaped the graph.
    pub citation: CitationSignal,
}

impl Discovery {
    /// Level-by-level agreement with another run over the same corpus.
    pub fn compare(&self, other: &Discovery) -> Result<HierarchyComparison> {
        compare(&self.tree, &other.tree)
    }
}

/// Builds research-stream hierarchies from a [`DocumentSet`].
#[derive(Debug, Clone, Default)]
pub struct StreamDiscovery {
    builder: HierarchyBuilder,
}

impl StreamDiscovery {
    /// Validate `config` and prepare the pipeline.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for an invalid configuration.
    pub fn new(config: ClusteringConfig) -> Result<Self> {
        Ok(Self {
            builder: HierarchyBuilder::new(config)?,
        })
    }

    /// Configuration every run uses.
    pub fn config(&self) -> &ClusteringConfig {
        self.builder.config()
    }

    /// Same pipeline with another run seed.
    pub fn with_seed(self, seed: u64) -> Result<Self> {
        let mut config = self.builder.config().clone();
        config.detector.seed = seed;
        Self::new(config)
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] / [`Error::DimensionMismatch`] for bad embeddings
    /// - [`Error::DocumentCountMismatch`] when reference lists are not aligned
    /// - whatever graph construction or hierarchy validation reports
    #[instrument(skip_all, fields(n = documents.len(), strategy = %self.config().hierarchy.strategy))]
    pub fn discover(&self, documents: &DocumentSet) -> Result<Discovery> {
        let config = self.config();
        let _ = check_embeddings(&documents.embeddings)?;

        let (coupling, citation) = match &documents.references {
            None => (None, CitationSignal::NotProvided),
            Some(references) => {
                if references.len() != documents.len() {
                    return Err(Error::DocumentCountMismatch {
                        left: documents.len(),
                        right: references.len(),
                    });
                }
                match config.graph.coupling_builder().build(references)? {
                    CouplingOutcome::Matrix(matrix) => {
                        let pairs = matrix.nnz();
                        (Some(matrix), CitationSignal::Present { pairs })
                    }
                    CouplingOutcome::NoCitationSignal => {
                        warn!("no document has references, clustering on similarity only");
                        (None, CitationSignal::Absent)
                    }
                }
            }
        };

        let evaluator = config
            .quality
            .evaluator(&documents.embeddings, config.detector.seed)?;
        let tree = self
            .builder
            .build_with_evaluator(&documents.embeddings, coupling.as_ref(), &evaluator)?;
        let levels = evaluator.report(&tree);

        info!(
            clusters = tree.total_clusters(),
            levels = tree.max_depth(),
            ?citation,
            "discovery finished"
        );
        Ok(Discovery {
            tree,
            levels,
            citation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::StrategyKind;

    /// Three groups of 12 documents around orthogonal axes.
    fn corpus() -> Vec<Vec<f32>> {
        let mut data = Vec::new();
        for axis in 0..3 {
            for i in 0..12 {
                let mut v = vec![0.02 * (i % 4) as f32; 3];
                v[axis] = 1.0;
                data.push(v);
            }
        }
        data
    }

    fn discovery() -> StreamDiscovery {
        let mut config = ClusteringConfig::default();
        config.graph.k = 5;
        config.hierarchy.strategy = StrategyKind::Recursive;
        config.hierarchy.min_cluster_size = 4;
        config.quality.min_labeled = 4;
        StreamDiscovery::new(config).unwrap()
    }

    #[test]
    fn test_without_references() {
        let result = discovery().discover(&DocumentSet::new(corpus())).unwrap();
        assert_eq!(result.citation, CitationSignal::NotProvided);
        assert_eq!(result.levels.len(), result.tree.max_depth());
        assert!(result.tree.roots().count() >= 3);
        assert!(result.levels[0].silhouette.is_some());
    }

    #[test]
    fn test_empty_references_fall_back() {
        let docs = DocumentSet::new(corpus()).with_references(vec![Vec::new(); 36]);
        let result = discovery().discover(&docs).unwrap();
        assert_eq!(result.citation, CitationSignal::Absent);
    }

    #[test]
    fn test_references_are_coupled() {
        let references: Vec<Vec<String>> = (0..36).map(|i| vec![format!("ref-{}", i / 12)]).collect();
        let docs = DocumentSet::new(corpus()).with_references(references);
        let result = discovery().discover(&docs).unwrap();
        // Every group of 12 cites one shared reference: 3 × C(12, 2) pairs.
        assert_eq!(result.citation, CitationSignal::Present { pairs: 198 });
    }

    #[test]
    fn test_misaligned_references_rejected() {
        let docs = DocumentSet::new(corpus()).with_references(vec![Vec::new(); 3]);
        assert!(matches!(
            discovery().discover(&docs),
            Err(Error::DocumentCountMismatch { left: 36, right: 3 })
        ));
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert!(matches!(
            discovery().discover(&DocumentSet::default()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_same_seed_reproduces() {
        let docs = DocumentSet::new(corpus());
        let a = discovery().discover(&docs).unwrap();
        let b = discovery().discover(&docs).unwrap();
        assert_eq!(a.tree, b.tree);
        let cmp = a.compare(&b).unwrap();
        assert!((cmp.mean_ari.unwrap() - 1.0).abs() < 1e-12);
    }
}
