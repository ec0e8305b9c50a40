//! Arena-backed cluster tree.
//!
//! Nodes live in one `Vec` in breadth-first order (all roots, then level 1 in
//! parent order, ...). Parent/child links are arena slots; the string ids are
//! derived from the structure and indexed for lookup.
//!
//! ```text
//! slot:   0    1    2     3     4     5
//! id:    "0"  "1"  "0.0" "0.1" "1.0" "1.1"
//! level:  0    0    1     1     1     1
//! ```

use super::node::{ClusterNode, NodeQuality};
use super::validate::{HealthCheck, Severity};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A forest of nested clusters over `n_documents` documents.
///
/// Constructed only through validation, so every tree in hand satisfies
/// containment, sibling disjointness and id lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TreeRecord", try_from = "TreeRecord")]
pub struct ClusterTree {
    pub(crate) nodes: Vec<ClusterNode>,
    pub(crate) roots: Vec<usize>,
    pub(crate) index: HashMap<String, usize>,
    n_documents: usize,
    strategy: String,
}

/// Shape statistics of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub n_documents: usize,
    pub total_clusters: usize,
    /// Number of levels.
    pub max_depth: usize,
    /// Clusters per level, top first.
    pub level_counts: Vec<usize>,
    pub n_leaves: usize,
    /// Documents covered by some root.
    pub covered_documents: usize,
}

impl ClusterTree {
    /// Assemble and validate.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHierarchy`] naming the first structural violation.
    pub(crate) fn from_parts(
        nodes: Vec<ClusterNode>,
        roots: Vec<usize>,
        n_documents: usize,
        strategy: impl Into<String>,
    ) -> Result<Self> {
        let tree = Self::assemble(nodes, roots, n_documents, strategy);
        if tree.index.len() != tree.nodes.len() {
            return Err(Error::InvalidHierarchy("cluster ids are not unique".into()));
        }
        let report = tree.health_check();
        if let Some(issue) = report.validation.issues_at_level(Severity::Error).first() {
            return Err(Error::InvalidHierarchy(issue.to_string()));
        }
        Ok(tree)
    }

    /// Assemble without validation.
    pub(crate) fn assemble(
        nodes: Vec<ClusterNode>,
        roots: Vec<usize>,
        n_documents: usize,
        strategy: impl Into<String>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id().to_string(), slot))
            .collect();
        Self {
            nodes,
            roots,
            index,
            n_documents,
            strategy: strategy.into(),
        }
    }

    /// Corpus size the tree was built over.
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Name of the strategy that built the tree.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn total_clusters(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ClusterNode> {
        self.index.get(id).and_then(|&slot| self.nodes.get(slot))
    }

    /// Like [`Self::get`], but an unknown id is an error.
    pub fn node(&self, id: &str) -> Result<&ClusterNode> {
        self.get(id).ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    /// Top-level clusters, largest first.
    pub fn roots(&self) -> impl Iterator<Item = &ClusterNode> + '_ {
        self.roots.iter().filter_map(|&slot| self.nodes.get(slot))
    }

    pub fn children(&self, id: &str) -> Result<Vec<&ClusterNode>> {
        let node = self.node(id)?;
        Ok(self.children_of(node).collect())
    }

    pub fn children_of<'a>(&'a self, node: &'a ClusterNode) -> impl Iterator<Item = &'a ClusterNode> + 'a {
        node.children.iter().filter_map(|&slot| self.nodes.get(slot))
    }

    pub fn parent_of(&self, node: &ClusterNode) -> Option<&ClusterNode> {
        node.parent().and_then(|id| self.get(id))
    }

    /// All clusters in breadth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &ClusterNode> + '_ {
        self.nodes.iter()
    }

    /// Clusters at `level`, in breadth-first order.
    pub fn nodes_at_level(&self, level: usize) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.level() == level).collect()
    }

    pub fn leaves(&self) -> Vec<&ClusterNode> {
        self.nodes.iter().filter(|n| n.is_leaf()).collect()
    }

    /// Number of levels (0 for an empty tree).
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.level() + 1).max().unwrap_or(0)
    }

    pub fn level_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.max_depth()];
        for node in &self.nodes {
            counts[node.level()] += 1;
        }
        counts
    }

    pub fn summary(&self) -> TreeSummary {
        TreeSummary {
            n_documents: self.n_documents,
            total_clusters: self.nodes.len(),
            max_depth: self.max_depth(),
            level_counts: self.level_counts(),
            n_leaves: self.nodes.iter().filter(|n| n.is_leaf()).count(),
            covered_documents: self.roots().map(ClusterNode::size).sum(),
        }
    }

    /// Per-document label at `level`: the position of the covering cluster among
    /// [`Self::nodes_at_level`], or `-1` where no cluster at that level covers it.
    pub fn flatten_level(&self, level: usize) -> Vec<i64> {
        let mut labels = vec![-1i64; self.n_documents];
        for (label, node) in self.nodes_at_level(level).into_iter().enumerate() {
            for &doc in node.documents() {
                if let Some(slot) = labels.get_mut(doc) {
                    *slot = label as i64;
                }
            }
        }
        labels
    }

    /// One flat labeling per level, keyed `cluster_l{level}`.
    pub fn flatten(&self) -> BTreeMap<String, Vec<i64>> {
        (0..self.max_depth())
            .map(|level| (format!("cluster_l{level}"), self.flatten_level(level)))
            .collect()
    }

    /// Clusters containing `document`, from its root down to the deepest one.
    pub fn path_of(&self, document: usize) -> Vec<&ClusterNode> {
        let mut path = Vec::new();
        let mut current = self.roots().find(|n| n.contains(document));
        while let Some(node) = current {
            path.push(node);
            current = self.children_of(node).find(|c| c.contains(document));
        }
        path
    }

    /// Attach metadata to a cluster. Existing keys are overwritten.
    pub fn annotate(&mut self, id: &str, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        let node = self
            .nodes
            .get_mut(slot)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        let _ = node.annotations.insert(key.into(), value);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a serialized tree.
    ///
    /// Malformed JSON is [`Error::Serialization`]; a structurally invalid tree is
    /// [`Error::InvalidHierarchy`].
    pub fn from_json(source: &str) -> Result<Self> {
        let record: TreeRecord = serde_json::from_str(source)?;
        Self::try_from(record)
    }

    fn record(&self, slot: usize) -> Option<NodeRecord> {
        let node = self.nodes.get(slot)?;
        Some(NodeRecord {
            id: node.id().to_string(),
            level: node.level(),
            parent: node.parent().map(str::to_string),
            size: node.size(),
            document_indices: node.documents().to_vec(),
            quality: node.quality().clone(),
            annotations: node.annotations().clone(),
            children: node.children.iter().filter_map(|&c| self.record(c)).collect(),
        })
    }

    /// Build a tree from nested flat labelings. Level 0 groups become roots; each
    /// node is split by the next labeling when that yields at least two groups.
    #[cfg(test)]
    pub(crate) fn from_label_levels(levels: &[Vec<usize>]) -> Self {
        fn groups(labels: &[usize], members: &[usize]) -> Vec<Vec<usize>> {
            let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for &m in members {
                by_label.entry(labels[m]).or_default().push(m);
            }
            by_label.into_values().collect()
        }

        let n = levels[0].len();
        let all: Vec<usize> = (0..n).collect();
        let mut nodes = Vec::new();
        let mut roots = Vec::new();
        for (i, g) in groups(&levels[0], &all).into_iter().enumerate() {
            roots.push(nodes.len());
            nodes.push(ClusterNode::new(i.to_string(), 0, None, g));
        }
        let mut frontier = roots.clone();
        for (depth, labels) in levels.iter().enumerate().skip(1) {
            let mut next = Vec::new();
            for slot in frontier {
                let split = groups(labels, nodes[slot].documents());
                if split.len() < 2 {
                    continue;
                }
                let parent_id = nodes[slot].id().to_string();
                for (j, g) in split.into_iter().enumerate() {
                    let child = nodes.len();
                    nodes.push(ClusterNode::new(format!("{parent_id}.{j}"), depth, Some(parent_id.clone()), g));
                    nodes[slot].children.push(child);
                    next.push(child);
                }
            }
            frontier = next;
        }
        Self::from_parts(nodes, roots, n, "labels").unwrap()
    }
}

impl<'a> IntoIterator for &'a ClusterTree {
    type Item = &'a ClusterNode;
    type IntoIter = std::slice::Iter<'a, ClusterNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Serialized form: nested clusters with their document lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeRecord {
    n_documents: usize,
    strategy: String,
    #[serde(default, skip_deserializing)]
    summary: Option<TreeSummary>,
    roots: Vec<NodeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    level: usize,
    #[serde(default)]
    parent: Option<String>,
    size: usize,
    document_indices: Vec<usize>,
    #[serde(default)]
    quality: NodeQuality,
    #[serde(default)]
    annotations: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    children: Vec<NodeRecord>,
}

impl From<ClusterTree> for TreeRecord {
    fn from(tree: ClusterTree) -> Self {
        Self {
            n_documents: tree.n_documents,
            strategy: tree.strategy.clone(),
            summary: Some(tree.summary()),
            roots: tree.roots.iter().filter_map(|&slot| tree.record(slot)).collect(),
        }
    }
}

impl TryFrom<TreeRecord> for ClusterTree {
    type Error = Error;

    fn try_from(record: TreeRecord) -> Result<Self> {
        let mut nodes: Vec<ClusterNode> = Vec::new();
        let mut roots = Vec::new();
        let mut queue: VecDeque<(NodeRecord, Option<usize>)> =
            record.roots.into_iter().map(|r| (r, None)).collect();

        while let Some((rec, parent_slot)) = queue.pop_front() {
            if rec.size != rec.document_indices.len() {
                return Err(Error::InvalidHierarchy(format!(
                    "cluster {} declares size {} but lists {} documents",
                    rec.id,
                    rec.size,
                    rec.document_indices.len()
                )));
            }
            let slot = nodes.len();
            let mut node =
                ClusterNode::new(rec.id, rec.level, rec.parent, rec.document_indices).with_quality(rec.quality);
            node.annotations = rec.annotations;
            nodes.push(node);
            match parent_slot {
                Some(p) => nodes[p].children.push(slot),
                None => roots.push(slot),
            }
            queue.extend(rec.children.into_iter().map(|c| (c, Some(slot))));
        }

        Self::from_parts(nodes, roots, record.n_documents, record.strategy)
    }
}
