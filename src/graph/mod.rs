//! Document graphs: embedding kNN graphs and citation coupling.
//!
//! Two signals feed community detection:
//!
//! - **Semantic proximity**: a symmetrized k-nearest-neighbor graph over embeddings
//!   ([`KnnGraphBuilder`]). Every document gets at least `k` edges, so the graph has no
//!   isolated nodes and its density is controlled by one knob.
//! - **Bibliographic coupling**: Jaccard overlap of reference lists
//!   ([`CouplingMatrixBuilder`]). Sparse by nature, built through an inverted index so
//!   pairs sharing nothing are never touched.
//!
//! [`couple_graph`] merges the two into a single weighted graph.

mod coupling;
mod hybrid;
mod knn;
mod metric;

pub use coupling::{CouplingMatrix, CouplingMatrixBuilder, CouplingOutcome};
pub use hybrid::couple_graph;
pub use knn::{nearest_neighbors, KnnGraphBuilder, SimilarityGraph, WeightFunction};
pub use metric::{Metric, PreparedVectors};

pub(crate) use metric::check_embeddings;
