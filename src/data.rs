use crate::error::{Error, Result};

/// Labeled feature vectors with dense integer labels in `[0, num_classes)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    features: Vec<Vec<f64>>,
    labels: Vec<usize>,
    num_classes: usize,
}

impl TrainingSet {
    /// Builds a training set, inferring the number of classes as the largest
    /// label plus one.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if `features` and `labels` differ in length, or
    ///   if the feature vectors do not all share one dimension.
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<Self> {
        let num_classes = labels.iter().max().map_or(0, |&max| max + 1);
        Self::with_classes(features, labels, num_classes)
    }

    /// Builds a training set with an explicit class count, so that classes
    /// absent from this particular sample still get a probability slot.
    ///
    /// # Errors
    ///
    /// Same as [`TrainingSet::new`], plus `OutOfRange` for a label that is
    /// not below `num_classes`.
    pub fn with_classes(
        features: Vec<Vec<f64>>,
        labels: Vec<usize>,
        num_classes: usize,
    ) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(Error::DimensionMismatch {
                expected: features.len(),
                actual: labels.len(),
            });
        }
        if let Some(first) = features.first() {
            let dim = first.len();
            if let Some(bad) = features.iter().find(|f| f.len() != dim) {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: bad.len(),
                });
            }
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(Error::OutOfRange {
                what: "label",
                value: label,
                limit: num_classes,
            });
        }

        Ok(Self {
            features,
            labels,
            num_classes,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Feature dimension, or 0 for an empty set.
    pub fn dim(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    pub fn point(&self, index: usize) -> &[f64] {
        &self.features[index]
    }

    pub fn label(&self, index: usize) -> usize {
        self.labels[index]
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Relative class frequencies; the fallback distribution for a query
    /// whose vote carries no mass.
    pub fn class_priors(&self) -> Vec<f64> {
        let mut priors = vec![0.0; self.num_classes];
        if self.is_empty() {
            return priors;
        }
        for &label in &self.labels {
            priors[label] += 1.0;
        }
        let n = self.len() as f64;
        for p in priors.iter_mut() {
            *p /= n;
        }
        priors
    }

    /// Checks that a query has the training dimension.
    pub(crate) fn check_query(&self, query: &[f64]) -> Result<()> {
        if query.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: query.len(),
            });
        }
        Ok(())
    }
}
