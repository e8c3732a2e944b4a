//! Error types shared by every classifier in the crate.

use thiserror::Error;

/// Errors raised by graph construction, training, search and classification.
///
/// Numeric degeneracies (a zero distance, a zero probability mass) are not
/// errors; they are recovered where they occur.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Classification requested before training, or training requested
    /// without data.
    #[error("model is not initialized: {0}")]
    UninitializedModel(String),

    /// A configuration value that the algorithms cannot work with.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// An index or neighborhood size outside the training set bounds.
    #[error("{what} {value} is out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        value: usize,
        limit: usize,
    },

    /// Inconsistent feature dimensions or array lengths.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UninitializedModel("no training data".to_string());
        assert!(err.to_string().contains("not initialized"));

        let err = Error::invalid("distance_exponent", "must be greater than 1");
        assert!(err.to_string().contains("distance_exponent"));
        assert!(err.to_string().contains("greater than 1"));

        let err = Error::OutOfRange {
            what: "k",
            value: 12,
            limit: 9,
        };
        assert_eq!(err.to_string(), "k 12 is out of range (limit 9)");

        let err = Error::DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        assert!(err.to_string().contains("expected 3, got 2"));
    }
}
