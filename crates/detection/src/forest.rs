use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{FeatureVector, FEATURE_COUNT};

/// Scores treat every source in one batch as a point in feature space
/// and measure how easily random axis-aligned splits isolate it.
/// Convention, fixed for downstream severity derivation: scores lie in
/// (0, 1] and **higher means more anomalous**.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Expected fraction of outliers in a batch. Primary sensitivity
    /// tunable: directly controls the `is_outlier` cut.
    pub contamination: f64,
    /// Minimum distinct sources for a meaningful fit.
    pub min_sources: usize,
    pub tree_count: usize,
    /// Per-tree subsample cap (without replacement).
    pub sample_size: usize,
    /// RNG seed. Fixed seed makes batch scoring reproducible.
    pub seed: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            min_sources: 2,
            tree_count: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyResult {
    pub source_id: String,
    pub score: f64,
    pub is_outlier: bool,
}

/// A batch too small to support outlier detection. Recoverable: the
/// fuser treats it as "no anomaly signal", not a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientDataError {
    pub sources: usize,
    pub required: usize,
}

impl fmt::Display for InsufficientDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "anomaly scoring needs at least {} sources, got {}",
            self.required, self.sources
        )
    }
}

impl std::error::Error for InsufficientDataError {}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        dim: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average unsuccessful-search path length of a binary search tree
/// over `n` points; normalizes raw isolation depths.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
    2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
}

fn build_tree(
    points: &[[f64; FEATURE_COUNT]],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if indices.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only dimensions with spread can split; identical points are a leaf.
    let mut splittable = [false; FEATURE_COUNT];
    let mut splittable_count = 0;
    for dim in 0..FEATURE_COUNT {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &idx in indices.iter() {
            min = min.min(points[idx][dim]);
            max = max.max(points[idx][dim]);
        }
        if max > min {
            splittable[dim] = true;
            splittable_count += 1;
        }
    }
    if splittable_count == 0 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let mut choice = rng.gen_range(0..splittable_count);
    let mut dim = 0;
    for (candidate, ok) in splittable.iter().enumerate() {
        if *ok {
            if choice == 0 {
                dim = candidate;
                break;
            }
            choice -= 1;
        }
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &idx in indices.iter() {
        min = min.min(points[idx][dim]);
        max = max.max(points[idx][dim]);
    }
    let value = rng.gen_range(min..max);

    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    for &idx in indices.iter() {
        if points[idx][dim] < value {
            left_indices.push(idx);
        } else {
            right_indices.push(idx);
        }
    }

    Node::Split {
        dim,
        value,
        left: Box::new(build_tree(points, &left_indices, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(points, &right_indices, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, point: &[f64; FEATURE_COUNT], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split {
            dim,
            value,
            left,
            right,
        } => {
            if point[*dim] < *value {
                path_length(left, point, depth + 1.0)
            } else {
                path_length(right, point, depth + 1.0)
            }
        }
    }
}

/// Unsupervised per-batch outlier scorer. Refit on every batch — no
/// model state survives between scoring passes, so each result set is
/// a pure function of the batch's feature table and the seed.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    config: ScorerConfig,
}

impl AnomalyScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Fit an isolation forest over the batch and score every source.
    ///
    /// `is_outlier` marks scores at or above the batch's
    /// `(1 - contamination)` quantile. A batch whose feature vectors
    /// are all identical produces no outliers: there is no bulk
    /// distribution to stand apart from.
    pub fn score_batch(
        &self,
        features: &[FeatureVector],
    ) -> Result<Vec<AnomalyResult>, InsufficientDataError> {
        if features.len() < self.config.min_sources {
            return Err(InsufficientDataError {
                sources: features.len(),
                required: self.config.min_sources,
            });
        }

        // Order by source id so scoring is independent of caller order.
        let mut ordered: Vec<&FeatureVector> = features.iter().collect();
        ordered.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        let points: Vec<[f64; FEATURE_COUNT]> = ordered.iter().map(|f| f.values).collect();

        let sample_size = self.config.sample_size.min(points.len()).max(2);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let normalizer = average_path_length(sample_size).max(f64::MIN_POSITIVE);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut trees = Vec::with_capacity(self.config.tree_count);
        for _ in 0..self.config.tree_count {
            let sample = sample_without_replacement(points.len(), sample_size, &mut rng);
            trees.push(build_tree(&points, &sample, 0, max_depth, &mut rng));
        }

        let scores: Vec<f64> = points
            .iter()
            .map(|point| {
                let total: f64 = trees
                    .iter()
                    .map(|tree| path_length(tree, point, 0.0))
                    .sum();
                let mean_path = total / trees.len() as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect();

        let threshold = outlier_threshold(&scores, self.config.contamination);

        Ok(ordered
            .iter()
            .zip(scores)
            .map(|(feature, score)| AnomalyResult {
                source_id: feature.source_id.clone(),
                score,
                is_outlier: threshold.map(|t| score >= t).unwrap_or(false),
            })
            .collect())
    }
}

fn sample_without_replacement(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k.min(n) {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(k.min(n));
    pool
}

/// Score cut for the configured contamination: the k-th largest score
/// where k = max(1, floor(n * contamination)). `None` when the batch
/// has no spread at all.
fn outlier_threshold(scores: &[f64], contamination: f64) -> Option<f64> {
    let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_normal() {
        return None;
    }

    let k = ((scores.len() as f64) * contamination).floor() as usize;
    let k = k.clamp(1, scores.len());
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    Some(sorted[k - 1])
}
