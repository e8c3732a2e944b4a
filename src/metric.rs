use std::fmt::Debug;

/// A distance function between two feature vectors.
///
/// The classifiers treat the metric as opaque; any non-negative function
/// works, although the inverse-distance weighting assumes that smaller means
/// closer.
pub trait Metric: Debug + Clone + Send + Sync {
    /// Compute the distance between `a` and `b`.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Metric for Euclidean {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

/// Manhattan (L1) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Manhattan;

impl Metric for Manhattan {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b.iter()).map(|(&x, &y)| (x - y).abs()).sum()
    }
}
