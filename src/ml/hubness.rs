//! Hubness-aware fuzzy nearest-neighbor classification.
//!
//! In high-dimensional data a few points (hubs) turn up in the k-neighbor
//! lists of many others while most points (anti-hubs) turn up rarely or
//! never. The classifiers here learn, for every training point, how often
//! it occurs as a neighbor of each class, and let it vote with that
//! distribution instead of its label.
//!
//! The pieces, in data-flow order:
//!
//! 1. [`OccurrenceCounts`]: raw occurrence tables of a neighbor graph at one k.
//! 2. [`ModelTrainer`]: smoothed tables and anti-hub fallbacks, as a [`TrainedModel`].
//! 3. [`VoteEstimator`]: class probabilities for one query.
//! 4. [`HyperparameterSearch`]: leave-one-out selection of k, the anti-hub
//!    cutoff, the fallback scheme and the distance exponent, using
//!    [`LeaveOneOut`] overlays instead of retraining.
//! 5. [`HubnessFuzzyClassifier`]: all of the above behind [`Classifier`](crate::ml::Classifier).

pub mod anti_hub;
pub mod classifier;
pub mod config;
pub mod leave_one_out;
pub mod occurrence;
pub mod search;
pub mod trainer;
pub mod vote;
pub mod weighting;

#[cfg(test)]
mod tests;

pub use anti_hub::LocalDistributions;
pub use classifier::{HubnessFuzzyClassifier, DWHFNN, HFNN, HIKNN};
pub use config::{AntiHubScheme, HubnessConfig, HyperparameterChoice};
pub use leave_one_out::LeaveOneOut;
pub use occurrence::{OccurrenceCounts, OccurrenceModel};
pub use search::{HyperparameterSearch, SearchSpace};
pub use trainer::{ModelTrainer, TrainedModel};
pub use vote::VoteEstimator;
pub use weighting::{Informative, InverseDistance, Uniform, VoteWeighting};
