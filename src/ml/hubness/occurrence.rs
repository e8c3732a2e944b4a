//! Raw neighbor-occurrence counts and the view the vote estimator reads.

use super::config::AntiHubScheme;
use crate::error::{Error, Result};
use crate::graph::{NeighborGraph, OccurrenceStats};
use ndarray::Array2;

/// Read access to a set of occurrence tables, trained or patched.
///
/// Profiles are written into caller-provided buffers of length
/// `num_classes()`.
pub trait OccurrenceModel {
    fn num_classes(&self) -> usize;

    fn num_points(&self) -> usize;

    fn label(&self, point: usize) -> usize;

    /// How often `point` occurs in other points' neighborhoods.
    fn occurrence(&self, point: usize) -> u32;

    /// Largest occurrence frequency over the training set.
    fn max_occurrence(&self) -> u32;

    /// Class-occurrence relation of `point`: one smoothed value per class.
    fn occurrence_profile(&self, point: usize, out: &mut [f64]);

    /// Fallback distribution of `point` under `scheme`.
    fn anti_hub_profile(&self, scheme: AntiHubScheme, point: usize, out: &mut [f64]);
}

/// `(count + λ) / (occurrence + 1 + C·λ)`; the `+ 1` is the point's
/// reference to itself.
pub fn smoothed_relation(count: f64, occurrence: f64, num_classes: usize, laplace: f64) -> f64 {
    (count + laplace) / (occurrence + 1.0 + num_classes as f64 * laplace)
}

/// `(count + λ) / (class_hubness + C·λ)`. A class that never occurs as a
/// neighbor, with no smoothing, gets a uniform row.
pub fn smoothed_prior(count: f64, class_hubness: f64, num_classes: usize, laplace: f64) -> f64 {
    let denominator = class_hubness + num_classes as f64 * laplace;
    if denominator > 0.0 {
        (count + laplace) / denominator
    } else {
        1.0 / num_classes as f64
    }
}

/// Unsmoothed occurrence counts of a training set at one `k`.
///
/// Built once per `k` and never mutated afterwards; leave-one-out removal
/// works on an overlay (see [`super::leave_one_out::LeaveOneOut`]).
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceCounts {
    k: usize,
    num_classes: usize,
    stats: OccurrenceStats,
    /// [class, point]: self reference plus one per neighborhood of that
    /// class the point occurs in.
    class_counts: Array2<u32>,
    /// [neighbor class, query class].
    class_to_class: Array2<u32>,
    /// Occurrences of neighbors of each class.
    class_hubness: Vec<u32>,
    reverse: Vec<Vec<usize>>,
    max_occurrence: u32,
}

impl OccurrenceCounts {
    /// Counts the first `k` neighbors of every point in `graph`.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if `labels` does not cover the graph.
    /// - `OutOfRange` if `k` exceeds the graph's stored size, or a label is
    ///   not below `num_classes`.
    pub fn from_graph(
        graph: &NeighborGraph,
        labels: &[usize],
        num_classes: usize,
        k: usize,
    ) -> Result<Self> {
        if labels.len() != graph.len() {
            return Err(Error::DimensionMismatch {
                expected: graph.len(),
                actual: labels.len(),
            });
        }
        if let Some(&label) = labels.iter().find(|&&c| c >= num_classes) {
            return Err(Error::OutOfRange {
                what: "label",
                value: label,
                limit: num_classes,
            });
        }
        let stats = graph.stats_for_k(k, labels)?;
        let reverse = graph.reverse_neighbors(k)?;

        let n = graph.len();
        let mut class_counts = Array2::<u32>::zeros((num_classes, n));
        let mut class_to_class = Array2::<u32>::zeros((num_classes, num_classes));
        let mut class_hubness = vec![0u32; num_classes];
        for (i, &c) in labels.iter().enumerate() {
            class_counts[[c, i]] += 1;
            for &nb in graph.neighbors(i).iter().take(k) {
                class_counts[[c, nb]] += 1;
                class_to_class[[labels[nb], c]] += 1;
                class_hubness[labels[nb]] += 1;
            }
        }
        let max_occurrence = stats.occurrence.iter().copied().max().unwrap_or(0);

        Ok(Self {
            k,
            num_classes,
            stats,
            class_counts,
            class_to_class,
            class_hubness,
            reverse,
            max_occurrence,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn len(&self) -> usize {
        self.stats.occurrence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.occurrence.is_empty()
    }

    pub fn stats(&self) -> &OccurrenceStats {
        &self.stats
    }

    pub fn occurrence(&self, point: usize) -> u32 {
        self.stats.occurrence[point]
    }

    pub fn max_occurrence(&self) -> u32 {
        self.max_occurrence
    }

    pub fn class_count(&self, class: usize, point: usize) -> u32 {
        self.class_counts[[class, point]]
    }

    pub fn class_to_class(&self, neighbor_class: usize, query_class: usize) -> u32 {
        self.class_to_class[[neighbor_class, query_class]]
    }

    pub fn class_hubness(&self, class: usize) -> u32 {
        self.class_hubness[class]
    }

    /// Points that have `point` among their first `k` neighbors.
    pub fn reverse_neighbors(&self, point: usize) -> &[usize] {
        &self.reverse[point]
    }
}
