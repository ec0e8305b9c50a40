#![allow(dead_code)]

use rand::prelude::*;
use rand_distr::{Distribution, Normal};

/// `n` documents spread round-robin over `n_blobs` Gaussian blobs in `dim`
/// dimensions. Blob `b` is centered on `5 · e_b`, so blobs are far apart under
/// both cosine and Euclidean distance.
///
/// Returns the embeddings and the blob of each document.
pub fn blobs(n: usize, n_blobs: usize, dim: usize, seed: u64) -> (Vec<Vec<f32>>, Vec<usize>) {
    assert!(n_blobs <= dim);
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0f32, 0.3).unwrap();
    let mut embeddings = Vec::with_capacity(n);
    let mut truth = Vec::with_capacity(n);
    for i in 0..n {
        let blob = i % n_blobs;
        let mut v: Vec<f32> = (0..dim).map(|_| noise.sample(&mut rng)).collect();
        v[blob] += 5.0;
        embeddings.push(v);
        truth.push(blob);
    }
    (embeddings, truth)
}
