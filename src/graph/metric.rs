//! Distance metrics over dense document vectors.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance metric used for neighbor search and density estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cos(a, b)`, in `[0, 2]`.
    #[default]
    Cosine,
    /// L2 distance.
    Euclidean,
}

impl Metric {
    /// Name as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(Error::invalid(
                "metric",
                format!("unknown metric '{other}' (expected cosine or euclidean)"),
            )),
        }
    }
}

/// Validate a row-major embedding set and return its dimension.
pub(crate) fn check_embeddings(embeddings: &[Vec<f32>]) -> Result<usize> {
    if embeddings.is_empty() {
        return Err(Error::EmptyInput);
    }
    let dim = embeddings[0].len();
    if dim == 0 {
        return Err(Error::invalid("embeddings", "vectors must be non-empty"));
    }
    if let Some(e) = embeddings.iter().find(|e| e.len() != dim) {
        return Err(Error::DimensionMismatch {
            expected: dim,
            found: e.len(),
        });
    }
    Ok(dim)
}

/// A subset of the corpus copied into a contiguous matrix ready for distance queries.
///
/// For [`Metric::Cosine`] rows are L2-normalized so that distance is a single dot product.
/// Zero vectors stay zero and sit at distance 1 from everything.
#[derive(Debug, Clone)]
pub struct PreparedVectors {
    data: Array2<f32>,
    metric: Metric,
}

impl PreparedVectors {
    /// Prepare every row of `embeddings`.
    pub fn new(embeddings: &[Vec<f32>], metric: Metric) -> Result<Self> {
        let all: Vec<usize> = (0..embeddings.len()).collect();
        Self::subset(embeddings, &all, metric)
    }

    /// Prepare the rows named by `members`, in that order.
    pub fn subset(embeddings: &[Vec<f32>], members: &[usize], metric: Metric) -> Result<Self> {
        let dim = check_embeddings(embeddings)?;
        if members.is_empty() {
            return Err(Error::EmptyInput);
        }
        let mut data = Array2::<f32>::zeros((members.len(), dim));
        for (row, &doc) in members.iter().enumerate() {
            let source = embeddings.get(doc).ok_or_else(|| {
                Error::invalid("members", format!("document {doc} is out of range"))
            })?;
            for (j, &v) in source.iter().enumerate() {
                data[[row, j]] = v;
            }
        }
        if metric == Metric::Cosine {
            for mut row in data.rows_mut() {
                let norm = row.dot(&row).sqrt();
                if norm > 0.0 {
                    row /= norm;
                }
            }
        }
        Ok(Self { data, metric })
    }

    /// Number of prepared rows.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// True when no rows are prepared.
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Metric the rows were prepared for.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Row `i` of the prepared matrix.
    pub fn row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.data.row(i)
    }

    /// Distance between prepared rows `i` and `j`.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f32 {
        let a = self.data.row(i);
        let b = self.data.row(j);
        match self.metric {
            Metric::Cosine => (1.0 - a.dot(&b)).max(0.0),
            Metric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}
