pub mod fuzzy;
pub mod hw_knn;
pub mod k_nearest;
pub mod selection;
pub mod weighted;

// Re-export public types and functions
pub use fuzzy::{fuzzy_membership, FNNClassifier};
pub use hw_knn::{BadHubness, HwKNNClassifier};
pub use k_nearest::KNNClassifier;
pub use selection::{select_k, KNNConfig, KSelection};
pub use weighted::DWKNNClassifier;
