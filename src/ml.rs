pub mod classic;
pub mod classifier;
pub mod hubness;

pub use classic::*;
pub use classifier::{arg_max, arg_max_random, Classifier, NeighborhoodSize};
pub use hubness::*;
