//! Tree validation and health checking.
//!
//! Structural checks shared by every tree (reachability, cycles, parent/child
//! consistency) plus the cluster-specific invariants:
//!
//! - every document list is non-empty, strictly ascending and inside the corpus
//! - a child's documents are a subset of its parent's
//! - siblings (and roots) are pairwise disjoint
//! - `level(child) = level(parent) + 1`, roots at level 0
//! - ids follow the lineage: root `i` is `"i"`, child `j` of `p` is `"p.j"`
//!
//! # Example
//!
//! ```rust
//! use canopy::hierarchy::{ClusterTree, HealthCheck};
//!
//! # fn check(tree: &ClusterTree) {
//! let report = tree.health_check();
//! if !report.is_healthy() {
//!     for issue in &report.validation.issues {
//!         eprintln!("{}: {}", issue.severity, issue.message);
//!     }
//! }
//! # }
//! ```

use std::collections::{HashMap, HashSet};

use super::ClusterTree;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A problem that should be fixed.
    Error,
    /// A critical issue that may cause failures.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single validation issue found during health check.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Optional cluster id involved.
    pub node_id: Option<String>,
    /// Optional additional context.
    pub context: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            node_id: None,
            context: None,
        }
    }

    /// Add a cluster id to this issue.
    pub fn with_node(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// Add context to this issue.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(id) = &self.node_id {
            write!(f, " (cluster {})", id)?;
        }
        if let Some(ctx) = &self.context {
            write!(f, " - {}", ctx)?;
        }
        Ok(())
    }
}

/// Report from a validation/health check.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Add an info-level issue.
    pub fn info(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Info, message));
    }

    /// Add a warning-level issue.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Warning, message));
    }

    /// Add an error-level issue.
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message));
    }

    /// Add a critical-level issue.
    pub fn critical(&mut self, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Critical, message));
    }

    /// Check if the report contains no errors or critical issues.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// Check if there are any issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Get issues of a specific severity or higher.
    pub fn issues_at_level(&self, min_severity: Severity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity >= min_severity)
            .collect()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "Validation passed: no issues found");
        }

        let counts = self.counts();
        write!(f, "Validation report: ")?;

        let parts: Vec<String> = [
            (Severity::Critical, "critical"),
            (Severity::Error, "errors"),
            (Severity::Warning, "warnings"),
            (Severity::Info, "info"),
        ]
        .iter()
        .filter_map(|(sev, name)| counts.get(sev).map(|c| format!("{} {}", c, name)))
        .collect();

        writeln!(f, "{}", parts.join(", "))?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// Health report with additional statistics.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Validation issues.
    pub validation: ValidationReport,
    /// Total number of nodes.
    pub node_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Number of levels.
    pub max_depth: usize,
    /// Average branching factor.
    pub avg_branching_factor: f64,
}

impl HealthReport {
    /// Check if the tree is healthy (no errors or critical issues).
    pub fn is_healthy(&self) -> bool {
        self.validation.is_healthy()
    }
}

impl std::fmt::Display for HealthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tree Health Report")?;
        writeln!(f, "==================")?;
        writeln!(f, "Nodes: {} ({} leaves)", self.node_count, self.leaf_count)?;
        writeln!(f, "Max depth: {}", self.max_depth)?;
        writeln!(f, "Avg branching factor: {:.2}", self.avg_branching_factor)?;
        writeln!(f)?;
        write!(f, "{}", self.validation)
    }
}

/// Trait for types that can be health-checked.
pub trait HealthCheck {
    /// Perform a health check and return a report.
    fn health_check(&self) -> HealthReport;

    /// Quick check: returns true if healthy.
    fn is_healthy(&self) -> bool {
        self.health_check().is_healthy()
    }
}

impl HealthCheck for ClusterTree {
    fn health_check(&self) -> HealthReport {
        let node_count = self.nodes.len();

        let mut parents: HashMap<usize, usize> = HashMap::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut shared_children = Vec::new();

        for (slot, node) in self.nodes.iter().enumerate() {
            if !node.children.is_empty() {
                let _ = children.insert(slot, node.children.clone());
                for &child in &node.children {
                    if parents.insert(child, slot).is_some() {
                        shared_children.push(child);
                    }
                }
            }
        }

        let mut validation = validate_tree_structure(&parents, &children, node_count);

        if node_count == 0 {
            validation.error("tree has no clusters");
        }
        for slot in shared_children {
            validation.add(self.issue(Severity::Error, "cluster listed under more than one parent", slot));
        }
        for &root in &self.roots {
            if parents.contains_key(&root) {
                validation.add(self.issue(Severity::Error, "root is also listed as a child", root));
            }
        }
        let listed_roots: HashSet<usize> = self.roots.iter().copied().collect();
        let parentless = (0..node_count).filter(|s| !parents.contains_key(s)).count();
        if parentless != listed_roots.len() {
            validation.error(format!(
                "{parentless} parentless clusters but {} listed roots",
                listed_roots.len()
            ));
        }

        self.check_documents(&mut validation);
        self.check_lineage(&mut validation);
        self.check_index(&mut validation);

        let uncovered = self.n_documents() - self.covered().min(self.n_documents());
        if uncovered > 0 {
            validation.info(format!("{uncovered} documents are not covered by any root"));
        }

        let leaf_count = self.nodes.iter().filter(|n| n.is_leaf()).count();
        let avg_branching_factor = if node_count == 0 {
            0.0
        } else {
            let total_children: usize = self.nodes.iter().map(|n| n.children.len()).sum();
            total_children as f64 / node_count as f64
        };

        HealthReport {
            validation,
            node_count,
            leaf_count,
            max_depth: self.max_depth(),
            avg_branching_factor,
        }
    }
}

impl ClusterTree {
    fn issue(&self, severity: Severity, message: &str, slot: usize) -> ValidationIssue {
        let issue = ValidationIssue::new(severity, message);
        match self.nodes.get(slot) {
            Some(node) => issue.with_node(node.id()),
            None => issue.with_context(format!("missing slot {slot}")),
        }
    }

    fn covered(&self) -> usize {
        self.roots
            .iter()
            .filter_map(|&slot| self.nodes.get(slot))
            .map(|n| n.size())
            .sum()
    }

    /// Document lists: non-empty, ascending, in range, nested, disjoint among siblings.
    fn check_documents(&self, report: &mut ValidationReport) {
        let n = self.n_documents();
        for node in &self.nodes {
            let docs = node.documents();
            if docs.is_empty() {
                report.add(ValidationIssue::new(Severity::Error, "cluster has no documents").with_node(node.id()));
            }
            if docs.windows(2).any(|w| w[0] >= w[1]) {
                report.add(
                    ValidationIssue::new(Severity::Error, "documents are not strictly ascending")
                        .with_node(node.id()),
                );
            }
            if let Some(&last) = docs.last() {
                if last >= n {
                    report.add(
                        ValidationIssue::new(Severity::Error, "document index outside the corpus")
                            .with_node(node.id())
                            .with_context(format!("index {last}, corpus of {n}")),
                    );
                }
            }

            for child in node.children.iter().filter_map(|&c| self.nodes.get(c)) {
                if !child.documents().iter().all(|d| node.contains(*d)) {
                    report.add(
                        ValidationIssue::new(Severity::Error, "child documents escape the parent")
                            .with_node(child.id())
                            .with_context(format!("parent {}", node.id())),
                    );
                }
            }
            if let Some(doc) = self.first_overlap(&node.children) {
                report.add(
                    ValidationIssue::new(Severity::Error, "sibling clusters overlap")
                        .with_node(node.id())
                        .with_context(format!("document {doc}")),
                );
            }
            if node.children.len() == 1 {
                report.add(
                    ValidationIssue::new(Severity::Warning, "cluster has a single child").with_node(node.id()),
                );
            }
        }
        if let Some(doc) = self.first_overlap(&self.roots) {
            report.add(
                ValidationIssue::new(Severity::Error, "root clusters overlap").with_context(format!("document {doc}")),
            );
        }
    }

    fn first_overlap(&self, slots: &[usize]) -> Option<usize> {
        let mut seen = HashSet::new();
        slots
            .iter()
            .filter_map(|&s| self.nodes.get(s))
            .flat_map(|n| n.documents().iter().copied())
            .find(|&doc| !seen.insert(doc))
    }

    /// Levels, parent ids and hierarchical ids follow the structure.
    fn check_lineage(&self, report: &mut ValidationReport) {
        for (i, node) in self.roots.iter().filter_map(|&s| self.nodes.get(s)).enumerate() {
            if node.level() != 0 {
                report.add(ValidationIssue::new(Severity::Error, "root is not at level 0").with_node(node.id()));
            }
            if node.parent().is_some() {
                report.add(ValidationIssue::new(Severity::Error, "root names a parent").with_node(node.id()));
            }
            if node.id() != i.to_string() {
                report.add(
                    ValidationIssue::new(Severity::Error, "root id does not match its position")
                        .with_node(node.id())
                        .with_context(format!("expected {i}")),
                );
            }
        }

        for parent in &self.nodes {
            for (j, child) in parent.children.iter().filter_map(|&c| self.nodes.get(c)).enumerate() {
                if child.level() != parent.level() + 1 {
                    report.add(
                        ValidationIssue::new(Severity::Error, "child level is not parent level + 1")
                            .with_node(child.id())
                            .with_context(format!("parent level {}, child level {}", parent.level(), child.level())),
                    );
                }
                if child.parent() != Some(parent.id()) {
                    report.add(
                        ValidationIssue::new(Severity::Error, "child names the wrong parent")
                            .with_node(child.id())
                            .with_context(format!("expected {}", parent.id())),
                    );
                }
                let expected = format!("{}.{j}", parent.id());
                if child.id() != expected {
                    report.add(
                        ValidationIssue::new(Severity::Error, "child id does not follow its lineage")
                            .with_node(child.id())
                            .with_context(format!("expected {expected}")),
                    );
                }
            }
            for &slot in &parent.children {
                if slot >= self.nodes.len() {
                    report.add(
                        ValidationIssue::new(Severity::Error, "child slot does not exist")
                            .with_node(parent.id())
                            .with_context(format!("missing slot {slot}")),
                    );
                }
            }
        }
    }

    fn check_index(&self, report: &mut ValidationReport) {
        if self.index.len() != self.nodes.len() {
            report.error(format!(
                "id index has {} entries for {} clusters",
                self.index.len(),
                self.nodes.len()
            ));
        }
        for (slot, node) in self.nodes.iter().enumerate() {
            if self.index.get(node.id()) != Some(&slot) {
                report.add(ValidationIssue::new(Severity::Error, "id index is stale").with_node(node.id()));
            }
        }
    }
}

/// Validate that a parent-child relationship forms a proper tree.
///
/// # Arguments
/// * `parents` - Map from node ID to parent ID (root has no entry)
/// * `children` - Map from node ID to child IDs
/// * `node_count` - Total number of nodes
///
/// # Returns
/// A validation report with any issues found.
pub fn validate_tree_structure(
    parents: &HashMap<usize, usize>,
    children: &HashMap<usize, Vec<usize>>,
    node_count: usize,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    // Find root(s) - nodes without parents
    let all_nodes: HashSet<usize> = (0..node_count).collect();
    let nodes_with_parents: HashSet<usize> = parents.keys().copied().collect();
    let roots: Vec<usize> = all_nodes.difference(&nodes_with_parents).copied().collect();

    if roots.is_empty() && node_count > 0 {
        report.critical("No root node found - tree has cycles");
    } else if roots.len() > 1 {
        report.info(format!("{} roots", roots.len()));
    }

    // Check for orphaned nodes (not reachable from root)
    let mut reachable = HashSet::new();
    let mut stack = roots.clone();

    while let Some(node) = stack.pop() {
        if reachable.insert(node) {
            if let Some(node_children) = children.get(&node) {
                stack.extend(node_children);
            }
        }
    }

    let orphans: Vec<usize> = all_nodes.difference(&reachable).copied().collect();
    if !orphans.is_empty() {
        report.add(
            ValidationIssue::new(
                Severity::Error,
                format!("{} orphaned nodes not reachable from root", orphans.len()),
            )
            .with_context(format!("first few: {:?}", &orphans[..orphans.len().min(5)])),
        );
    }

    // Check parent-child consistency
    for (child, parent) in parents {
        if let Some(parent_children) = children.get(parent) {
            if !parent_children.contains(child) {
                report.add(
                    ValidationIssue::new(
                        Severity::Error,
                        "Parent-child inconsistency: child claims parent but parent doesn't list child",
                    )
                    .with_context(format!("slot {child}, parent slot {parent}")),
                );
            }
        } else {
            report.add(
                ValidationIssue::new(Severity::Error, "Parent node has no children list")
                    .with_context(format!("parent slot {parent}")),
            );
        }
    }

    // Check for cycles using DFS with coloring
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    fn detect_cycle(
        node: usize,
        children: &HashMap<usize, Vec<usize>>,
        visited: &mut HashSet<usize>,
        in_stack: &mut HashSet<usize>,
    ) -> bool {
        if in_stack.contains(&node) {
            return true; // Cycle detected
        }
        if visited.contains(&node) {
            return false;
        }

        let _ = visited.insert(node);
        let _ = in_stack.insert(node);

        if let Some(node_children) = children.get(&node) {
            for &child in node_children {
                if detect_cycle(child, children, visited, in_stack) {
                    return true;
                }
            }
        }

        let _ = in_stack.remove(&node);
        false
    }

    for &root in &roots {
        if detect_cycle(root, children, &mut visited, &mut in_stack) {
            report.critical("Cycle detected in tree structure");
            break;
        }
    }

    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used, unused_results)]
mod tests {
    use super::*;
    use crate::hierarchy::ClusterNode;
    use proptest::prelude::*;

    fn node(id: &str, level: usize, parent: Option<&str>, docs: &[usize]) -> ClusterNode {
        ClusterNode::new(id.into(), level, parent.map(String::from), docs.to_vec())
    }

    /// Root "0" over `docs` with the given children.
    fn one_root(n: usize, docs: &[usize], children: Vec<ClusterNode>) -> ClusterTree {
        let mut nodes = vec![node("0", 0, None, docs)];
        for child in children {
            let slot = nodes.len();
            nodes.push(child);
            nodes[0].children.push(slot);
        }
        ClusterTree::assemble(nodes, vec![0], n, "manual")
    }

    fn has_error(tree: &ClusterTree, needle: &str) -> bool {
        tree.health_check()
            .validation
            .issues_at_level(Severity::Error)
            .iter()
            .any(|i| i.message.contains(needle))
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_validation_report_healthy() {
        let mut report = ValidationReport::new();
        report.info("Just some info");
        report.warn("A warning");

        assert!(report.is_healthy());

        report.error("An error");
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue::new(Severity::Error, "Something wrong")
            .with_node("3.1")
            .with_context("additional info");

        let s = format!("{}", issue);
        assert!(s.contains("ERROR"));
        assert!(s.contains("Something wrong"));
        assert!(s.contains("cluster 3.1"));
        assert!(s.contains("additional info"));
    }

    #[test]
    fn test_validate_valid_tree() {
        let parents: HashMap<usize, usize> = [(1, 0), (2, 0)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> = [(0, vec![1, 2])].into_iter().collect();

        let report = validate_tree_structure(&parents, &children, 3);
        assert!(report.is_healthy());
    }

    #[test]
    fn test_validate_orphaned_nodes() {
        // Root 0 alone; 1 <-> 2 form a cycle unreachable from it.
        let parents: HashMap<usize, usize> = [(1, 2), (2, 1)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> =
            [(1, vec![2]), (2, vec![1])].into_iter().collect();

        let report = validate_tree_structure(&parents, &children, 3);
        assert!(!report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("orphaned")));
    }

    #[test]
    fn test_validate_multiple_roots_is_fine() {
        let parents: HashMap<usize, usize> = [(1, 0), (3, 2)].into_iter().collect();
        let children: HashMap<usize, Vec<usize>> =
            [(0, vec![1]), (2, vec![3])].into_iter().collect();

        let report = validate_tree_structure(&parents, &children, 4);
        assert!(report.is_healthy());
        assert!(report.issues.iter().any(|i| i.message.contains("2 roots")));
    }

    #[test]
    fn test_well_formed_tree_is_healthy() {
        let tree = one_root(
            6,
            &[0, 1, 2, 3, 4],
            vec![node("0.0", 1, Some("0"), &[0, 1]), node("0.1", 1, Some("0"), &[3, 4])],
        );
        let report = tree.health_check();
        assert!(report.is_healthy(), "{}", report);
        assert_eq!(report.node_count, 3);
        assert_eq!(report.leaf_count, 2);
        assert_eq!(report.max_depth, 2);
        // Document 5 sits outside every root.
        assert!(report.validation.issues.iter().any(|i| i.message.contains("not covered")));
    }

    #[test]
    fn test_detects_escaping_child() {
        let tree = one_root(6, &[0, 1, 2], vec![node("0.0", 1, Some("0"), &[2, 5]), node("0.1", 1, Some("0"), &[0])]);
        assert!(has_error(&tree, "escape the parent"));
    }

    #[test]
    fn test_detects_overlapping_siblings() {
        let tree = one_root(
            4,
            &[0, 1, 2, 3],
            vec![node("0.0", 1, Some("0"), &[0, 1]), node("0.1", 1, Some("0"), &[1, 2])],
        );
        assert!(has_error(&tree, "sibling clusters overlap"));
    }

    #[test]
    fn test_detects_bad_lineage() {
        let tree = one_root(
            4,
            &[0, 1, 2, 3],
            vec![node("0.0", 2, Some("0"), &[0, 1]), node("0.7", 1, Some("9"), &[2, 3])],
        );
        assert!(has_error(&tree, "parent level + 1"));
        assert!(has_error(&tree, "wrong parent"));
        assert!(has_error(&tree, "lineage"));
    }

    #[test]
    fn test_detects_bad_document_lists() {
        let tree = one_root(3, &[0, 2, 1, 7], vec![]);
        assert!(has_error(&tree, "strictly ascending"));
        assert!(has_error(&tree, "outside the corpus"));

        let tree = ClusterTree::assemble(vec![node("1", 0, None, &[])], vec![0], 3, "manual");
        assert!(has_error(&tree, "no documents"));
        assert!(has_error(&tree, "position"));
    }

    #[test]
    fn test_single_child_is_a_warning() {
        let tree = one_root(4, &[0, 1, 2, 3], vec![node("0.0", 1, Some("0"), &[0, 1])]);
        let report = tree.health_check();
        assert!(report.is_healthy(), "{}", report);
        assert!(!report.validation.issues_at_level(Severity::Warning).is_empty());
    }

    proptest! {
        #[test]
        fn nested_label_trees_are_healthy(
            coarse in proptest::collection::vec(0usize..4, 1..60),
            salt in proptest::collection::vec(0usize..3, 60),
        ) {
            let fine: Vec<usize> = coarse.iter().zip(&salt).map(|(c, s)| c * 3 + s).collect();
            let tree = ClusterTree::from_label_levels(&[coarse.clone(), fine]);
            let report = tree.health_check();
            prop_assert!(report.is_healthy(), "{}", report);
            prop_assert_eq!(tree.summary().covered_documents, coarse.len());
        }
    }
}
