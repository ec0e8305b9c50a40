//! Merging the kNN graph with bibliographic coupling.

use super::knn::SimilarityGraph;
use crate::error::{Error, Result};
use petgraph::graph::NodeIndex;

/// Add coupling edges to a similarity graph.
///
/// `coupling` holds `(a, b, jaccard)` triples in the graph's own node indexing (see
/// [`super::CouplingMatrix::restrict`]). An existing edge gains `weight × jaccard`; a coupled
/// pair with `jaccard >= min_jaccard` that is not yet connected becomes a new edge of weight
/// `weight × jaccard`.
pub fn couple_graph(
    graph: &SimilarityGraph,
    coupling: &[(usize, usize, f64)],
    weight: f32,
    min_jaccard: f64,
) -> Result<SimilarityGraph> {
    if !(weight.is_finite() && weight >= 0.0) {
        return Err(Error::invalid("coupling_weight", "must be finite and >= 0"));
    }
    if !(0.0..=1.0).contains(&min_jaccard) {
        return Err(Error::invalid("min_jaccard", "must lie in [0, 1]"));
    }

    let mut merged = graph.clone();
    if weight == 0.0 {
        return Ok(merged);
    }

    let n = merged.node_count();
    for &(a, b, jaccard) in coupling {
        if a >= n || b >= n || a == b {
            return Err(Error::invalid(
                "coupling",
                format!("pair ({a}, {b}) is outside a graph of {n} nodes"),
            ));
        }
        let (na, nb) = (NodeIndex::new(a), NodeIndex::new(b));
        let extra = weight * jaccard as f32;
        match merged.find_edge(na, nb) {
            Some(edge) => merged[edge] += extra,
            None if jaccard >= min_jaccard => {
                let _ = merged.add_edge(na, nb, extra);
            }
            None => {}
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path3() -> SimilarityGraph {
        let mut g = SimilarityGraph::new_undirected();
        let nodes: Vec<_> = (0..3).map(|_| g.add_node(())).collect();
        let _ = g.add_edge(nodes[0], nodes[1], 1.0);
        let _ = g.add_edge(nodes[1], nodes[2], 1.0);
        g
    }

    #[test]
    fn reinforces_and_adds_edges() {
        let merged = couple_graph(&path3(), &[(0, 1, 0.5), (0, 2, 0.4)], 1.0, 0.1).unwrap();
        assert_eq!(merged.edge_count(), 3);
        let e01 = merged.find_edge(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert!((merged[e01] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn weak_coupling_does_not_create_edges() {
        let merged = couple_graph(&path3(), &[(0, 2, 0.05)], 1.0, 0.1).unwrap();
        assert_eq!(merged.edge_count(), 2);
    }

    #[test]
    fn zero_weight_is_identity() {
        let merged = couple_graph(&path3(), &[(0, 2, 0.9)], 0.0, 0.0).unwrap();
        assert_eq!(merged.edge_count(), 2);
    }

    #[test]
    fn rejects_out_of_range_pairs() {
        assert!(couple_graph(&path3(), &[(0, 7, 0.9)], 1.0, 0.0).is_err());
    }
}
