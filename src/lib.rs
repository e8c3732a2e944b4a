//! Hubness-aware k-nearest-neighbor classification.
//!
//! Start with a [`TrainingSet`], pick a classifier ([`HFNN`], [`DWHFNN`],
//! [`HIKNN`], or one of the classic kNN variants) and drive it through the
//! [`Classifier`] trait.

pub mod data;
pub mod error;
pub mod graph;
pub mod metric;
pub mod ml;

pub use data::TrainingSet;
pub use error::{Error, Result};
pub use graph::{nearest_neighbors, KnnBuffer, NeighborGraph, OccurrenceStats};
pub use metric::{Euclidean, Manhattan, Metric};
pub use ml::{
    AntiHubScheme, Classifier, DWHFNN, DWKNNClassifier, FNNClassifier, HFNN, HIKNN,
    HubnessConfig, HubnessFuzzyClassifier, HwKNNClassifier, HyperparameterChoice,
    HyperparameterSearch, KNNClassifier, KNNConfig, ModelTrainer, NeighborhoodSize,
    SearchSpace, TrainedModel,
};
