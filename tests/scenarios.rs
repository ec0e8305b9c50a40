//! End-to-end scenarios on synthetic corpora.

mod common;

use canopy::community::{CommunityDetection, Leiden};
use canopy::config::ClusteringConfig;
use canopy::graph::{CouplingMatrixBuilder, CouplingOutcome, KnnGraphBuilder};
use canopy::hierarchy::{HealthCheck, HierarchyBuilder, StrategyKind};
use canopy::{ari, compare, DocumentSet, StreamDiscovery};

#[test]
fn separated_blobs_give_three_communities() {
    let (embeddings, truth) = common::blobs(100, 3, 32, 11);
    let graph = KnnGraphBuilder::new(10).build(&embeddings).unwrap();
    let partition = Leiden::new().detect(&graph, 1.0).unwrap();

    assert_eq!(partition.n_communities(), 3);
    assert!(partition.modularity > 0.3, "modularity {}", partition.modularity);
    assert!((ari(&partition.labels, &truth) - 1.0).abs() < 1e-12);
}

#[test]
fn coupling_is_jaccard_of_reference_sets() {
    let refs = vec![
        vec!["a", "b", "c", "d"],
        vec!["a", "b", "e", "f"],
        vec!["x"],
    ];
    let matrix = match CouplingMatrixBuilder::new().build(&refs).unwrap() {
        CouplingOutcome::Matrix(m) => m,
        CouplingOutcome::NoCitationSignal => panic!("references were given"),
    };
    let w = matrix.get(0, 1).unwrap();
    assert!((w - 2.0 / 6.0).abs() < 1e-12);
    assert_eq!(matrix.get(1, 0), Some(w));
    assert_eq!(matrix.get(0, 2), None);
    assert_eq!(matrix.nnz(), 1);
}

#[test]
fn empty_reference_sets_have_no_signal() {
    let refs: Vec<Vec<String>> = vec![Vec::new(); 5];
    let outcome = CouplingMatrixBuilder::new().build(&refs).unwrap();
    assert_eq!(outcome, CouplingOutcome::NoCitationSignal);
    assert!(outcome.matrix().is_none());
}

#[test]
fn small_roots_stay_leaves_for_every_strategy() {
    // Three blobs of 15; with k = 14 each blob is a clique in the kNN graph.
    let (embeddings, _) = common::blobs(45, 3, 16, 5);
    for strategy in [StrategyKind::MultiResolution, StrategyKind::Recursive, StrategyKind::Density] {
        let mut config = ClusteringConfig::default();
        config.graph.k = 14;
        config.hierarchy.strategy = strategy;
        config.hierarchy.min_cluster_size = 20;
        config.hierarchy.cohesion_threshold = 1.0;
        config.hierarchy.split_factor = 1;

        let tree = HierarchyBuilder::new(config).unwrap().build(&embeddings, None).unwrap();
        assert!(tree.is_healthy());
        for root in tree.roots() {
            if root.size() < 20 {
                assert!(root.is_leaf(), "{strategy}: {root}");
            }
        }
        if strategy != StrategyKind::Density {
            let sizes: Vec<usize> = tree.roots().map(|r| r.size()).collect();
            assert_eq!(sizes, vec![15, 15, 15], "{strategy}");
            assert_eq!(tree.max_depth(), 1);
        }
    }
}

#[test]
fn different_seeds_agree_at_the_top_level() {
    let (embeddings, _) = common::blobs(120, 4, 32, 23);
    let docs = DocumentSet::new(embeddings);

    let mut config = ClusteringConfig::default();
    config.graph.k = 10;
    let first = StreamDiscovery::new(config.clone()).unwrap();
    let second = first.clone().with_seed(1234).unwrap();

    let a = first.discover(&docs).unwrap();
    let b = second.discover(&docs).unwrap();
    let comparison = compare(&a.tree, &b.tree).unwrap();
    let top = &comparison.levels[0];
    assert_eq!(top.n_common, 120);
    assert!(top.ari.unwrap() >= 0.8, "{comparison}");
}

#[test]
fn citations_join_semantically_split_documents() {
    // Documents 2m and 2m + 1 sit in different blobs but cite the same single
    // reference. Without coupling the blobs are disconnected kNN components, so
    // no pair can share a root; a heavy coupling edge keeps every pair together.
    let (embeddings, truth) = common::blobs(40, 2, 16, 3);
    let references: Vec<Vec<String>> = (0..40).map(|i| vec![format!("paper-{}", i / 2)]).collect();
    let docs = DocumentSet::new(embeddings).with_references(references);

    let run = |coupling_weight: f32| {
        let mut config = ClusteringConfig::default();
        config.graph.k = 8;
        config.graph.coupling_weight = coupling_weight;
        config.hierarchy.strategy = StrategyKind::Recursive;
        StreamDiscovery::new(config).unwrap().discover(&docs).unwrap()
    };

    let coupled = run(50.0);
    assert_eq!(coupled.citation, canopy::CitationSignal::Present { pairs: 20 });
    assert!(coupled.tree.is_healthy());
    let labels = coupled.tree.flatten_level(0);
    for m in 0..20 {
        assert_ne!(truth[2 * m], truth[2 * m + 1]);
        assert!(labels[2 * m] >= 0, "document {} has no root", 2 * m);
        assert_eq!(labels[2 * m], labels[2 * m + 1], "pair {m} split with coupling: {labels:?}");
    }

    let uncoupled = run(0.0);
    assert!(uncoupled.tree.is_healthy());
    let labels = uncoupled.tree.flatten_level(0);
    for m in 0..20 {
        assert!(labels[2 * m] >= 0 && labels[2 * m + 1] >= 0);
        assert_ne!(labels[2 * m], labels[2 * m + 1], "pair {m} joined without coupling: {labels:?}");
    }
}
