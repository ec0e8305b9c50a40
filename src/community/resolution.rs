//! Picking a small set of distinct resolutions to serve as hierarchy levels.
//!
//! ```text
//!  γ:   0.1   0.3   0.5   0.7   0.9  ...  2.0      evenly spaced samples
//!        │     │     │     │     │          │
//!      detect detect ...                          one partition per sample
//!        │     │     │     │     │          │
//!      Q>0?  Q>0?  ...                            drop non-positive modularity
//!        │     ╳     │     ╳     │                drop ARI ≥ 0.95 vs last kept
//!        └─────┴─ top `max_levels` by Q ─┘
//!                 sorted by γ ascending           coarse → fine
//! ```

use super::traits::{CommunityDetection, Partition};
use crate::error::{Error, Result};
use crate::metrics::ari;
use petgraph::graph::UnGraph;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sweeps the resolution parameter and keeps the informative, non-redundant partitions.
#[derive(Debug, Clone)]
pub struct ResolutionSelector {
    min: f64,
    max: f64,
    n_samples: usize,
    redundancy_threshold: f64,
    max_levels: usize,
    min_modularity: f64,
}

impl ResolutionSelector {
    /// Sweep `[0.1, 2.0]` with 20 samples, keeping up to 5 levels.
    pub fn new() -> Self {
        Self {
            min: 0.1,
            max: 2.0,
            n_samples: 20,
            redundancy_threshold: 0.95,
            max_levels: 5,
            min_modularity: 0.0,
        }
    }

    /// Set the swept interval.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the number of evenly spaced samples.
    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    /// A sample whose ARI with the previously kept one reaches this value is dropped.
    pub fn with_redundancy_threshold(mut self, threshold: f64) -> Self {
        self.redundancy_threshold = threshold;
        self
    }

    /// Set the maximum number of partitions returned.
    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Samples with modularity at or below this value are discarded.
    pub fn with_min_modularity(mut self, min_modularity: f64) -> Self {
        self.min_modularity = min_modularity;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min >= 0.0) {
            return Err(Error::invalid("resolution range", "bounds must be finite and >= 0"));
        }
        if self.min > self.max {
            return Err(Error::invalid(
                "resolution range",
                format!("min {} exceeds max {}", self.min, self.max),
            ));
        }
        if self.n_samples == 0 {
            return Err(Error::invalid("n_samples", "must be >= 1"));
        }
        if self.max_levels == 0 {
            return Err(Error::invalid("max_levels", "must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.redundancy_threshold) {
            return Err(Error::invalid("redundancy_threshold", "must lie in [0, 1]"));
        }
        Ok(())
    }

    /// The sampled resolutions, ascending.
    pub fn resolutions(&self) -> Vec<f64> {
        if self.n_samples == 1 {
            return vec![self.min];
        }
        let step = (self.max - self.min) / (self.n_samples - 1) as f64;
        (0..self.n_samples)
            .map(|i| {
                if i + 1 == self.n_samples {
                    self.max
                } else {
                    self.min + step * i as f64
                }
            })
            .collect()
    }

    /// Detect at every sampled resolution and keep the distinct, informative partitions.
    ///
    /// Returns at most `max_levels` partitions sorted by ascending resolution (coarsest
    /// first). The result is empty when no sample reaches positive modularity.
    ///
    /// # Errors
    ///
    /// Invalid selector parameters, or any detection error (e.g. [`Error::EmptyGraph`]).
    #[instrument(skip_all, fields(n_samples = self.n_samples, nodes = graph.node_count()))]
    pub fn select<D, N>(&self, detector: &D, graph: &UnGraph<N, f32>) -> Result<Vec<Partition>>
    where
        D: CommunityDetection + Sync,
        N: Sync,
    {
        self.validate()?;
        let resolutions = self.resolutions();

        #[cfg(feature = "parallel")]
        let samples: Vec<Partition> = resolutions
            .par_iter()
            .map(|&gamma| detector.detect(graph, gamma))
            .collect::<Result<_>>()?;

        #[cfg(not(feature = "parallel"))]
        let samples: Vec<Partition> = resolutions
            .iter()
            .map(|&gamma| detector.detect(graph, gamma))
            .collect::<Result<_>>()?;

        let mut kept: Vec<Partition> = Vec::new();
        for sample in samples {
            debug!(
                resolution = sample.resolution,
                modularity = sample.modularity,
                communities = sample.n_communities(),
                "resolution sample"
            );
            if sample.modularity <= self.min_modularity {
                continue;
            }
            if let Some(last) = kept.last() {
                let agreement = ari(&last.labels, &sample.labels);
                if agreement >= self.redundancy_threshold {
                    debug!(
                        resolution = sample.resolution,
                        ari = agreement,
                        "redundant with previous level"
                    );
                    continue;
                }
            }
            kept.push(sample);
        }

        // Best modularity first; equal scores keep the coarser resolution.
        kept.sort_by(|a, b| {
            b.modularity
                .total_cmp(&a.modularity)
                .then(a.resolution.total_cmp(&b.resolution))
        });
        kept.truncate(self.max_levels);
        kept.sort_by(|a, b| a.resolution.total_cmp(&b.resolution));

        info!(
            levels = kept.len(),
            resolutions = ?kept.iter().map(|p| p.resolution).collect::<Vec<_>>(),
            "resolution levels selected"
        );
        Ok(kept)
    }
}

impl Default for ResolutionSelector {
    fn default() -> Self {
        Self::new()
    }
}
