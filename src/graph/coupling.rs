//! Bibliographic coupling: sparse Jaccard similarity over shared references.
//!
//! Two documents are coupled when they cite at least one common reference. For a corpus of
//! tens of thousands of documents almost every pair shares nothing, so the matrix is never
//! materialized densely and zero pairs are never visited:
//!
//! ```text
//! refs(doc) ──► inverted index: ref → [docs citing it]
//!                        │
//!                        ▼
//!            for each ref: every pair of its citing docs ──► shared[(i, j)] += 1
//!                        │
//!                        ▼
//!            J(i, j) = shared / (|refs_i| + |refs_j| - shared)
//! ```
//!
//! Work is proportional to `Σ_ref C(postings(ref), 2)` rather than `N²`.

use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Sparse symmetric coupling matrix.
///
/// Row `i` holds `(j, jaccard)` for every `j` sharing at least one reference with `i`,
/// sorted by `j`. Both `(i, j)` and `(j, i)` are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    nnz: usize,
}

impl CouplingMatrix {
    fn from_pairs(n: usize, pairs: impl IntoIterator<Item = (usize, usize, f64)>) -> Self {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut nnz = 0;
        for (i, j, w) in pairs {
            rows[i].push((j, w));
            rows[j].push((i, w));
            nnz += 1;
        }
        for row in &mut rows {
            row.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Self { rows, nnz }
    }

    /// Number of documents (matrix dimension).
    pub fn n_documents(&self) -> usize {
        self.rows.len()
    }

    /// Number of stored unordered pairs.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Jaccard coupling of `i` and `j`, or `None` when they share no reference.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let row = self.rows.get(i)?;
        row.binary_search_by(|probe| probe.0.cmp(&j))
            .ok()
            .map(|pos| row[pos].1)
    }

    /// Coupled neighbors of `i`, sorted by document index.
    pub fn neighbors(&self, i: usize) -> &[(usize, f64)] {
        self.rows.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every stored pair once, as `(i, j, jaccard)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .filter(move |(j, _)| *j > i)
                .map(move |&(j, w)| (i, j, w))
        })
    }

    /// Entries among `members`, re-indexed to positions in `members`.
    ///
    /// Returns `(a, b, jaccard)` with `a < b`.
    pub fn restrict(&self, members: &[usize]) -> Vec<(usize, usize, f64)> {
        let local: HashMap<usize, usize> = members
            .iter()
            .enumerate()
            .map(|(pos, &doc)| (doc, pos))
            .collect();
        let mut out = Vec::new();
        for (a, &doc) in members.iter().enumerate() {
            for &(other, w) in self.neighbors(doc) {
                if let Some(&b) = local.get(&other) {
                    if a < b {
                        out.push((a, b, w));
                    }
                }
            }
        }
        out
    }
}

/// Result of building a coupling matrix.
#[derive(Debug, Clone, PartialEq)]
pub enum CouplingOutcome {
    /// At least one document had references.
    Matrix(CouplingMatrix),
    /// No document cited anything; callers should fall back to similarity-only clustering.
    NoCitationSignal,
}

impl CouplingOutcome {
    /// The matrix, if there was a citation signal.
    pub fn matrix(&self) -> Option<&CouplingMatrix> {
        match self {
            CouplingOutcome::Matrix(m) => Some(m),
            CouplingOutcome::NoCitationSignal => None,
        }
    }

    /// Consume into the matrix, if there was a citation signal.
    pub fn into_matrix(self) -> Option<CouplingMatrix> {
        match self {
            CouplingOutcome::Matrix(m) => Some(m),
            CouplingOutcome::NoCitationSignal => None,
        }
    }
}

/// Builds [`CouplingMatrix`] values from per-document reference sets.
#[derive(Debug, Clone)]
pub struct CouplingMatrixBuilder {
    /// Minimum shared references for a pair to be stored.
    min_shared: usize,
    /// References cited by more documents than this are skipped.
    max_postings: Option<usize>,
}

impl CouplingMatrixBuilder {
    /// Store every pair sharing at least one reference.
    pub fn new() -> Self {
        Self {
            min_shared: 1,
            max_postings: None,
        }
    }

    /// Require at least `min_shared` common references per stored pair.
    pub fn with_min_shared(mut self, min_shared: usize) -> Self {
        self.min_shared = min_shared;
        self
    }

    /// Skip references cited by more than `max_postings` documents.
    ///
    /// Such references (a handful of classics cited by everything) dominate the pair
    /// count while carrying almost no topical signal.
    pub fn with_max_postings(mut self, max_postings: usize) -> Self {
        self.max_postings = Some(max_postings);
        self
    }

    /// Build the coupling matrix.
    ///
    /// `references[i]` is the reference set of document `i`; duplicates are ignored and
    /// identifiers are compared by exact string equality.
    #[instrument(skip_all, fields(n = references.len()))]
    pub fn build<S: AsRef<str>>(&self, references: &[Vec<S>]) -> Result<CouplingOutcome> {
        if self.min_shared == 0 {
            return Err(Error::invalid("min_shared", "must be at least 1"));
        }
        if matches!(self.max_postings, Some(m) if m < 2) {
            return Err(Error::invalid("max_postings", "must be at least 2"));
        }

        let n = references.len();
        let sets: Vec<HashSet<&str>> = references
            .iter()
            .map(|refs| refs.iter().map(AsRef::as_ref).collect())
            .collect();

        if sets.iter().all(HashSet::is_empty) {
            warn!("no document has references; coupling disabled");
            return Ok(CouplingOutcome::NoCitationSignal);
        }

        // Inverted index. Documents are visited in index order, so postings stay sorted.
        let mut postings: HashMap<&str, Vec<usize>> = HashMap::new();
        for (doc, set) in sets.iter().enumerate() {
            for &reference in set {
                postings.entry(reference).or_default().push(doc);
            }
        }

        let mut shared: HashMap<(usize, usize), usize> = HashMap::new();
        let mut skipped = 0usize;
        for docs in postings.values() {
            if docs.len() < 2 {
                continue;
            }
            if matches!(self.max_postings, Some(limit) if docs.len() > limit) {
                skipped += 1;
                continue;
            }
            for (a, &i) in docs.iter().enumerate() {
                for &j in &docs[a + 1..] {
                    *shared.entry((i, j)).or_insert(0) += 1;
                }
            }
        }
        if skipped > 0 {
            debug!(skipped, "skipped hub references");
        }

        let pairs = shared
            .into_iter()
            .filter(|&(_, count)| count >= self.min_shared)
            .map(|((i, j), count)| {
                let union = sets[i].len() + sets[j].len() - count;
                (i, j, count as f64 / union as f64)
            });
        let matrix = CouplingMatrix::from_pairs(n, pairs);

        info!(
            references = postings.len(),
            pairs = matrix.nnz(),
            "built coupling matrix"
        );
        Ok(CouplingOutcome::Matrix(matrix))
    }
}

impl Default for CouplingMatrixBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn refs(lists: &[&[&str]]) -> Vec<Vec<String>> {
        lists
            .iter()
            .map(|l| l.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn jaccard_of_half_overlap() {
        let references = refs(&[&["a", "b", "c", "d"], &["a", "b", "e", "f"], &["x"]]);
        let matrix = CouplingMatrixBuilder::new()
            .build(&references)
            .unwrap()
            .into_matrix()
            .unwrap();

        let j = matrix.get(0, 1).unwrap();
        assert!((j - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(matrix.get(1, 0), Some(j));
        assert_eq!(matrix.get(0, 2), None);
        assert_eq!(matrix.nnz(), 1);
    }

    #[test]
    fn no_references_is_a_status() {
        let references: Vec<Vec<String>> = vec![vec![], vec![], vec![]];
        let outcome = CouplingMatrixBuilder::new().build(&references).unwrap();
        assert_eq!(outcome, CouplingOutcome::NoCitationSignal);
        assert!(outcome.matrix().is_none());
    }

    #[test]
    fn documents_without_references_are_isolated() {
        let references = refs(&[&["a"], &[], &["a"]]);
        let matrix = CouplingMatrixBuilder::new()
            .build(&references)
            .unwrap()
            .into_matrix()
            .unwrap();
        assert!(matrix.neighbors(1).is_empty());
        assert_eq!(matrix.get(0, 2), Some(1.0));
    }

    #[test]
    fn duplicate_references_count_once() {
        let references = refs(&[&["a", "a", "b"], &["a", "c"]]);
        let matrix = CouplingMatrixBuilder::new()
            .build(&references)
            .unwrap()
            .into_matrix()
            .unwrap();
        // {a, b} vs {a, c}: 1 / 3
        assert!((matrix.get(0, 1).unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn min_shared_and_hubs() {
        let references = refs(&[&["hub", "a"], &["hub", "a"], &["hub", "b"], &["hub"]]);
        let matrix = CouplingMatrixBuilder::new()
            .with_max_postings(3)
            .build(&references)
            .unwrap()
            .into_matrix()
            .unwrap();
        // "hub" has 4 postings and is skipped, leaving only the (0, 1) pair via "a".
        assert_eq!(matrix.nnz(), 1);
        assert!(matrix.get(0, 1).is_some());

        let strict = CouplingMatrixBuilder::new()
            .with_min_shared(2)
            .build(&references)
            .unwrap()
            .into_matrix()
            .unwrap();
        assert_eq!(strict.pairs().collect::<Vec<_>>().len(), 1);
    }

    #[test]
    fn rejects_bad_parameters() {
        let references = refs(&[&["a"]]);
        assert!(CouplingMatrixBuilder::new()
            .with_min_shared(0)
            .build(&references)
            .is_err());
        assert!(CouplingMatrixBuilder::new()
            .with_max_postings(1)
            .build(&references)
            .is_err());
    }

    #[test]
    fn restrict_reindexes() {
        let references = refs(&[&["a"], &["b"], &["a", "b"], &["b"]]);
        let matrix = CouplingMatrixBuilder::new()
            .build(&references)
            .unwrap()
            .into_matrix()
            .unwrap();
        let local = matrix.restrict(&[3, 2]);
        assert_eq!(local.len(), 1);
        assert_eq!((local[0].0, local[0].1), (0, 1));
        assert!((local[0].2 - 0.5).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn stored_iff_shared_and_symmetric(
            docs in proptest::collection::vec(
                proptest::collection::vec(0u8..12, 0..6),
                2..30,
            )
        ) {
            let references: Vec<Vec<String>> = docs
                .iter()
                .map(|d| d.iter().map(|r| format!("ref-{r}")).collect())
                .collect();
            let outcome = CouplingMatrixBuilder::new().build(&references).unwrap();
            let Some(matrix) = outcome.matrix() else {
                prop_assert!(docs.iter().all(|d| d.is_empty()));
                return Ok(());
            };

            for i in 0..docs.len() {
                let a: HashSet<u8> = docs[i].iter().copied().collect();
                for j in 0..docs.len() {
                    if i == j {
                        continue;
                    }
                    let b: HashSet<u8> = docs[j].iter().copied().collect();
                    let inter = a.intersection(&b).count();
                    match matrix.get(i, j) {
                        None => prop_assert_eq!(inter, 0),
                        Some(w) => {
                            prop_assert!(inter > 0);
                            prop_assert_eq!(Some(w), matrix.get(j, i));
                            let expected = inter as f64 / (a.len() + b.len() - inter) as f64;
                            prop_assert!((w - expected).abs() < 1e-12);
                        }
                    }
                }
            }
        }
    }
}
