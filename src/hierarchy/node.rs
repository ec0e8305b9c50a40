//! Cluster node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Typed quality record of a node. Every measure is optional: singletons have no
/// cohesion, and only detection-based nodes carry a resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeQuality {
    /// Mean cosine of members to their centroid.
    #[serde(default)]
    pub cohesion: Option<f64>,
    /// Mean pairwise cosine among members.
    #[serde(default)]
    pub density: Option<f64>,
    /// Resolution of the partition that produced this node.
    #[serde(default)]
    pub resolution: Option<f64>,
    /// Modularity (γ = 1) of that partition.
    #[serde(default)]
    pub modularity: Option<f64>,
}

/// A cluster in a [`super::ClusterTree`].
///
/// The document set is fixed at construction, so `size()` always equals the
/// number of member documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    id: String,
    level: usize,
    parent: Option<String>,
    documents: Vec<usize>,
    /// Arena slots of the children, in local index order.
    pub(crate) children: Vec<usize>,
    pub(crate) quality: NodeQuality,
    pub(crate) annotations: BTreeMap<String, serde_json::Value>,
}

impl ClusterNode {
    /// `documents` are expected sorted and unique; tree validation rejects anything else.
    pub(crate) fn new(id: String, level: usize, parent: Option<String>, documents: Vec<usize>) -> Self {
        Self {
            id,
            level,
            parent,
            documents,
            children: Vec::new(),
            quality: NodeQuality::default(),
            annotations: BTreeMap::new(),
        }
    }

    pub(crate) fn with_quality(mut self, quality: NodeQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Hierarchical id, e.g. `"2.0.1"`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Depth in the tree (roots are level 0).
    pub fn level(&self) -> usize {
        self.level
    }

    /// Id of the parent cluster, `None` for roots.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Member document indices, ascending.
    pub fn documents(&self) -> &[usize] {
        &self.documents
    }

    /// Number of member documents.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of child clusters.
    pub fn n_children(&self) -> usize {
        self.children.len()
    }

    pub fn contains(&self, document: usize) -> bool {
        self.documents.binary_search(&document).is_ok()
    }

    pub fn quality(&self) -> &NodeQuality {
        &self.quality
    }

    /// Caller-supplied metadata (labels, keywords, burst scores, ...).
    pub fn annotations(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.annotations
    }
}

impl fmt::Display for ClusterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cluster[{}] L{} size={}", self.id, self.level, self.size())?;
        if let Some(cohesion) = self.quality.cohesion {
            write!(f, " cohesion={cohesion:.3}")?;
        }
        Ok(())
    }
}
