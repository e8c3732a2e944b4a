use crate::data::TrainingSet;
use crate::error::{Error, Result};
use rand::Rng;

/// How a classifier picks its neighborhood size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborhoodSize {
    /// Use exactly this many neighbors.
    Fixed(usize),
    /// Pick the best k in `[min, max]` by leave-one-out cross-validation on
    /// the training set.
    Auto { min: usize, max: usize },
}

impl Default for NeighborhoodSize {
    fn default() -> Self {
        NeighborhoodSize::Fixed(5)
    }
}

impl NeighborhoodSize {
    /// Largest k this setting can ask of the neighbor graph.
    pub fn max(&self) -> usize {
        match *self {
            NeighborhoodSize::Fixed(k) => k,
            NeighborhoodSize::Auto { max, .. } => max,
        }
    }

    /// Checks the setting against a training set of `n` points.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` for a zero k, or a search range with `min == 0`
    ///   or `min > max`.
    /// - `OutOfRange` if the largest k exceeds `n - 1`.
    pub fn validate(&self, n: usize) -> Result<()> {
        match *self {
            NeighborhoodSize::Fixed(0) => {
                return Err(Error::invalid("k", "neighborhood size must be positive"))
            }
            NeighborhoodSize::Auto { min, max } if min == 0 || min > max => {
                return Err(Error::invalid(
                    "k",
                    format!("search range [{min}, {max}] is empty or starts at zero"),
                ))
            }
            _ => {}
        }
        let limit = n.saturating_sub(1);
        if self.max() > limit {
            return Err(Error::OutOfRange {
                what: "k",
                value: self.max(),
                limit,
            });
        }
        Ok(())
    }
}

/// Common surface of every classifier in the crate.
pub trait Classifier {
    /// Fits the classifier to `data`, replacing any previous model.
    fn train(&mut self, data: &TrainingSet) -> Result<()>;

    /// Class-membership probabilities for `query`, summing to one.
    fn classify_probabilistically(&self, query: &[f64]) -> Result<Vec<f64>>;

    /// Most probable class for `query`. Ties go to the lowest class index.
    fn classify(&self, query: &[f64]) -> Result<usize> {
        Ok(arg_max(&self.classify_probabilistically(query)?))
    }

    /// Classify several queries at once.
    fn classify_batch(&self, queries: &[Vec<f64>]) -> Result<Vec<usize>> {
        queries.iter().map(|q| self.classify(q)).collect()
    }
}

/// Index of the first maximum.
pub fn arg_max(scores: &[f64]) -> usize {
    let mut best = 0;
    for (c, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = c;
        }
    }
    best
}

/// Index of a maximum, with ties broken uniformly at random.
///
/// Used during leave-one-out evaluation so that tied votes do not favor the
/// lower class indices.
pub fn arg_max_random<R: Rng + ?Sized>(scores: &[f64], rng: &mut R) -> usize {
    let mut best = 0;
    let mut ties = 0u32;
    for (c, &s) in scores.iter().enumerate() {
        if ties == 0 || s > scores[best] {
            best = c;
            ties = 1;
        } else if s == scores[best] {
            ties += 1;
            if rng.gen_range(0..ties) == 0 {
                best = c;
            }
        }
    }
    best
}
