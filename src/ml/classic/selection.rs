//! Configuration and leave-one-out k selection shared by the classic kNN
//! classifiers.

use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::NeighborGraph;
use crate::metric::Metric;
use crate::ml::classifier::{arg_max_random, NeighborhoodSize};
use crate::ml::hubness::config::{validate_exponent, DEFAULT_DISTANCE_EXPONENT};
use log::{debug, info, trace};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

/// Configuration of a classic kNN classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct KNNConfig {
    /// Fixed neighborhood size, or the range to search.
    pub k: NeighborhoodSize,
    /// Exponent `m` of the weighting `1 / d^(2/(m-1))`, for the members
    /// that weight by distance.
    pub distance_exponent: f64,
    /// Seed for the random tie-breaks during leave-one-out selection.
    pub seed: u64,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self::new(NeighborhoodSize::default())
    }
}

impl KNNConfig {
    /// Create a new config with the default exponent (2.0) and seed (0).
    pub fn new(k: NeighborhoodSize) -> Self {
        Self {
            k,
            distance_exponent: DEFAULT_DISTANCE_EXPONENT,
            seed: 0,
        }
    }

    pub fn with_distance_exponent(mut self, distance_exponent: f64) -> Self {
        self.distance_exponent = distance_exponent;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks the configuration against a training set of `n` points.
    pub fn validate(&self, n: usize) -> Result<()> {
        validate_exponent(self.distance_exponent)?;
        self.k.validate(n)
    }
}

/// The neighborhood size a classic classifier trained with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KSelection {
    pub k: usize,
    /// Leave-one-out accuracy, when k was searched.
    pub accuracy: Option<f64>,
}

/// Validates `config` and builds the neighbor graph a classic classifier
/// trains on. The graph holds one neighbor more than the largest k the
/// configuration can ask for, so that leave-one-out votes can look past a
/// removed point.
pub(crate) fn build_graph<M: Metric>(
    data: &TrainingSet,
    metric: &M,
    config: &KNNConfig,
) -> Result<NeighborGraph> {
    if data.is_empty() || data.num_classes() == 0 {
        return Err(Error::UninitializedModel(
            "cannot train on an empty training set".to_string(),
        ));
    }
    let n = data.len();
    config.validate(n)?;
    NeighborGraph::compute(data, metric, (config.k.max() + 1).min(n - 1))
}

/// Leave-one-out accuracy of every k in `[k_min, k_max]`; the most accurate
/// wins, the smallest k among equals.
///
/// Each training point is classified from its own first k graph neighbors,
/// which never include the point itself. Vote ties are broken at random
/// with a generator seeded from `seed` and the candidate's offset in the
/// range.
pub fn select_k<S, V>(
    graph: &NeighborGraph,
    labels: &[usize],
    k_min: usize,
    k_max: usize,
    seed: u64,
    prepare: S,
) -> Result<KSelection>
where
    S: Fn(usize) -> Result<V> + Sync,
    V: Fn(usize, &[usize], &[f64]) -> Vec<f64>,
{
    if graph.len() != labels.len() {
        return Err(Error::DimensionMismatch {
            expected: labels.len(),
            actual: graph.len(),
        });
    }
    if labels.is_empty() {
        return Err(Error::UninitializedModel(
            "cannot select k without data".to_string(),
        ));
    }
    if k_min == 0 || k_min > k_max {
        return Err(Error::invalid(
            "k",
            format!("search range [{k_min}, {k_max}] is empty or starts at zero"),
        ));
    }
    if k_max > graph.k() {
        return Err(Error::OutOfRange {
            what: "k",
            value: k_max,
            limit: graph.k(),
        });
    }

    debug!("selecting k in [{}, {}] over {} points", k_min, k_max, labels.len());
    let accuracies = (k_min..=k_max)
        .into_par_iter()
        .map(|k| {
            let vote = prepare(k)?;
            let mut rng = ChaCha20Rng::seed_from_u64(seed.wrapping_add((k - k_min) as u64));
            let mut correct = 0usize;
            for (i, &label) in labels.iter().enumerate() {
                let neighbors = graph.neighbors(i);
                let take = k.min(neighbors.len());
                let probs = vote(i, &neighbors[..take], &graph.distances(i)[..take]);
                if arg_max_random(&probs, &mut rng) == label {
                    correct += 1;
                }
            }
            let accuracy = correct as f64 / labels.len() as f64;
            trace!("k={} -> {:.4}", k, accuracy);
            Ok(accuracy)
        })
        .collect::<Result<Vec<f64>>>()?;

    let mut best = 0;
    for (offset, &accuracy) in accuracies.iter().enumerate() {
        if accuracy > accuracies[best] {
            best = offset;
        }
    }
    let selection = KSelection {
        k: k_min + best,
        accuracy: Some(accuracies[best]),
    };
    info!("selected k={} accuracy={:.4}", selection.k, accuracies[best]);
    Ok(selection)
}

/// Normalizes `votes` in place, or replaces them with `priors` when they
/// carry no mass.
pub(crate) fn normalize_or_priors(votes: &mut Vec<f64>, priors: &[f64]) {
    let total: f64 = votes.iter().sum();
    if total > 0.0 && total.is_finite() {
        for v in votes.iter_mut() {
            *v /= total;
        }
    } else {
        trace!("vote mass is {}, falling back to class priors", total);
        votes.clear();
        votes.extend_from_slice(priors);
    }
}
