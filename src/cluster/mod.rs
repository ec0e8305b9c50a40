//! Density-based clustering over embedding vectors.
//!
//! Graph community detection needs a neighborhood graph and a resolution. The
//! density route needs neither: [`Hdbscan`] reads clusters straight off the
//! geometry and is free to leave sparse documents unassigned.
//!
//! ```text
//! embeddings ─▶ core distances ─▶ mutual reachability MST
//!                                        │
//!                                        ▼
//!               flat labels ◀─ selection ◀─ condensed tree ◀─ Dendrogram
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use canopy::cluster::{ClusterSelection, Hdbscan};
//! use canopy::graph::Metric;
//!
//! let mut data: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32 * 0.01, 0.0]).collect();
//! data.extend((0..10).map(|i| vec![5.0 + i as f32 * 0.01, 0.0]));
//!
//! let labels = Hdbscan::new(6)
//!     .with_metric(Metric::Euclidean)
//!     .with_selection(ClusterSelection::Eom)
//!     .fit(&data)
//!     .unwrap();
//! assert_eq!(labels[0], Some(0));
//! assert_eq!(labels[19], Some(1));
//! ```

mod dendrogram;
mod hdbscan;

pub use dendrogram::{Dendrogram, Merge};
pub use hdbscan::{ClusterSelection, Hdbscan};
