use canopy::config::ClusteringConfig;
use canopy::hierarchy::StrategyKind;
use canopy::{DocumentSet, StreamDiscovery};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=canopy=debug shows per-node decisions.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Four synthetic "fields" of 60 papers each in 32 dimensions. Papers in
    // fields 0 and 1 cite a shared survey, so coupling pulls them together.
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0f32, 0.4)?;
    let mut embeddings = Vec::new();
    let mut references = Vec::new();
    for i in 0..240 {
        let field = i % 4;
        let mut v: Vec<f32> = (0..32).map(|_| noise.sample(&mut rng)).collect();
        v[field] += 4.0;
        v[field + 4] += 2.0 * ((i / 4) % 2) as f32;
        embeddings.push(v);

        let mut refs = vec![format!("field-{field}-{}", (i / 4) % 10)];
        if field < 2 {
            refs.push("survey".to_string());
        }
        references.push(refs);
    }

    let config = match std::env::args().nth(1) {
        Some(path) => ClusteringConfig::from_file(path)?,
        None => {
            let mut config = ClusteringConfig::default();
            config.graph.k = 12;
            config.hierarchy.strategy = StrategyKind::MultiResolution;
            config
        }
    };

    let docs = DocumentSet::new(embeddings).with_references(references);
    let discovery = StreamDiscovery::new(config)?;
    let result = discovery.discover(&docs)?;

    println!("citation signal: {:?}", result.citation);
    println!("{:#?}", result.tree.summary());
    for node in result.tree.iter() {
        println!("{}{}", "  ".repeat(node.level()), node);
    }
    for level in &result.levels {
        println!(
            "level {}: {} clusters, {} covered, silhouette {:?}",
            level.level, level.n_clusters, level.n_labeled, level.silhouette
        );
    }

    // Stability across seeds.
    let other = discovery.with_seed(99)?.discover(&docs)?;
    println!("{}", result.compare(&other)?);
    Ok(())
}
