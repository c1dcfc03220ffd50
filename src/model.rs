//! K-Means clustering of normalized student scores

use std::collections::HashSet;

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::data::ScoreData;
use crate::error::ScoreError;

/// K-Means model wrapper with fitted parameters
#[derive(Debug)]
pub struct ClusterModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster id for every student, in file order
    pub assignments: Array1<usize>,
    /// Cluster centroids in normalized space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
}

impl ClusterModel {
    /// Nearest centroid for a normalized score vector
    pub fn predict(&self, features: &Array1<f64>) -> crate::Result<usize> {
        if features.len() != self.centroids.ncols() {
            return Err(ScoreError::ScoreCount {
                expected: self.centroids.ncols(),
                found: features.len(),
            });
        }

        let closest = self
            .centroids
            .outer_iter()
            .map(|centroid| squared_distance(features.view(), centroid))
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or(0, |(cluster, _)| cluster);

        Ok(closest)
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &id in self.assignments.iter() {
            if id < self.n_clusters {
                sizes[id] += 1;
            }
        }
        sizes
    }

    /// Mean silhouette coefficient over the first `sample_size` points
    ///
    /// Points alone in their cluster score 0.
    pub fn compute_silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size);
        if n_samples < 2 {
            return 0.0;
        }

        let sample = features.slice(s![..n_samples, ..]);
        let total: f64 = (0..n_samples)
            .map(|i| self.silhouette_of(sample, i))
            .sum();
        total / n_samples as f64
    }

    fn silhouette_of(&self, sample: ArrayView2<f64>, i: usize) -> f64 {
        // Distance sum and member count per cluster, excluding point i
        let mut sums = vec![0.0; self.n_clusters];
        let mut counts = vec![0usize; self.n_clusters];
        for (j, other) in sample.outer_iter().enumerate() {
            let cluster = self.assignments[j];
            if j != i && cluster < self.n_clusters {
                sums[cluster] += squared_distance(sample.row(i), other).sqrt();
                counts[cluster] += 1;
            }
        }

        let mean_to = |cluster: usize| (counts[cluster] > 0).then(|| sums[cluster] / counts[cluster] as f64);
        let own = self.assignments[i];
        let Some(a) = mean_to(own) else {
            return 0.0;
        };
        let b = (0..self.n_clusters)
            .filter(|&c| c != own)
            .filter_map(mean_to)
            .fold(f64::INFINITY, f64::min);

        if b.is_infinite() || a.max(b) == 0.0 {
            0.0
        } else {
            (b - a) / a.max(b)
        }
    }
}

/// Partition students into `config.n_clusters` groups
///
/// Runs K-Means on the normalized scores with a seeded RNG, so the same
/// input and seed always produce the same assignments. Cluster ids carry
/// no meaning of their own; use the labeler to name them.
pub fn fit_clusters(data: &ScoreData, config: &PipelineConfig) -> crate::Result<ClusterModel> {
    let n_clusters = config.n_clusters;
    let n_samples = data.features.nrows();

    if n_samples < n_clusters {
        return Err(ScoreError::TooFewRecords {
            found: n_samples,
            required: n_clusters,
        });
    }

    let distinct = count_distinct_rows(&data.raw_scores);
    if distinct < n_clusters {
        return Err(ScoreError::TooFewDistinct {
            distinct,
            required: n_clusters,
        });
    }

    debug!(
        n_clusters,
        seed = config.seed,
        max_iters = config.max_iters,
        tolerance = config.tolerance,
        "fitting k-means"
    );

    let targets: Array1<usize> = Array1::zeros(n_samples);
    let dataset = Dataset::new(data.features.clone(), targets);

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(config.max_iters)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .map_err(|e| ScoreError::Clustering(e.to_string()))?;

    let assignments: Array1<usize> = model.predict(&data.features);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(&data.features, &assignments, &centroids);

    let fitted = ClusterModel {
        n_clusters,
        assignments,
        centroids,
        inertia,
    };

    if let Some(empty) = fitted.cluster_sizes().iter().position(|&size| size == 0) {
        return Err(ScoreError::EmptyCluster(empty));
    }

    info!(inertia = fitted.inertia, sizes = ?fitted.cluster_sizes(), "k-means fitted");
    Ok(fitted)
}

fn count_distinct_rows(scores: &Array2<f64>) -> usize {
    scores
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

/// Within-cluster sum of squared distances to the assigned centroid
fn compute_inertia(features: &Array2<f64>, assignments: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(assignments.iter())
        .filter(|(_, cluster)| **cluster < centroids.nrows())
        .map(|(point, &cluster)| squared_distance(point, centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    (&a - &b).mapv(|d| d * d).sum()
}
