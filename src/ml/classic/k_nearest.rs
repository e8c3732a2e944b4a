use super::selection::{build_graph, normalize_or_priors, select_k, KNNConfig, KSelection};
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::nearest_neighbors;
use crate::metric::{Euclidean, Metric};
use crate::ml::classifier::{Classifier, NeighborhoodSize};

/// A k-NN classifier that stores training data and performs majority-vote
/// classification.
///
/// # Type Parameters
/// - `M`: the distance metric, Euclidean by default.
///
/// The neighborhood size is either fixed or picked by leave-one-out
/// cross-validation over a range, see [`NeighborhoodSize`].
#[derive(Debug, Clone)]
pub struct KNNClassifier<M: Metric = Euclidean> {
    config: KNNConfig,
    metric: M,
    data: Option<TrainingSet>,
    selection: Option<KSelection>,
}

impl KNNClassifier<Euclidean> {
    /// Constructs a new, untrained `KNNClassifier`.
    ///
    /// # Example
    ///
    /// ```
    /// use hubknn::{Classifier, KNNClassifier, NeighborhoodSize, TrainingSet};
    ///
    /// let features = vec![
    ///     vec![1.0, 2.0],
    ///     vec![2.0, 3.0],
    ///     vec![3.0, 3.0],
    ///     vec![6.0, 7.0],
    /// ];
    /// let labels = vec![0, 0, 1, 1];
    /// let data = TrainingSet::new(features, labels).unwrap();
    ///
    /// let mut knn = KNNClassifier::new(NeighborhoodSize::Fixed(3));
    /// knn.train(&data).unwrap();
    ///
    /// // Predict for a new point
    /// let predicted = knn.classify(&[2.1, 2.9]).unwrap();
    /// assert_eq!(predicted, 0);
    /// ```
    pub fn new(k: NeighborhoodSize) -> Self {
        Self::with_config(KNNConfig::new(k), Euclidean)
    }
}

impl<M: Metric> KNNClassifier<M> {
    pub fn with_config(config: KNNConfig, metric: M) -> Self {
        Self {
            config,
            metric,
            data: None,
            selection: None,
        }
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Neighborhood size in use, once trained.
    pub fn k(&self) -> Option<usize> {
        self.selection.map(|s| s.k)
    }

    pub fn selection(&self) -> Option<&KSelection> {
        self.selection.as_ref()
    }
}

/// Label histogram of the neighbors.
pub(crate) fn majority_votes(labels: &[usize], neighbors: &[usize], num_classes: usize) -> Vec<f64> {
    let mut votes = vec![0.0; num_classes];
    for &nb in neighbors {
        votes[labels[nb]] += 1.0;
    }
    votes
}

impl<M: Metric> Classifier for KNNClassifier<M> {
    fn train(&mut self, data: &TrainingSet) -> Result<()> {
        let graph = build_graph(data, &self.metric, &self.config)?;
        let labels = data.labels();
        let num_classes = data.num_classes();
        let selection = match self.config.k {
            NeighborhoodSize::Fixed(k) => KSelection { k, accuracy: None },
            NeighborhoodSize::Auto { min, max } => {
                select_k(&graph, labels, min, max, self.config.seed, |_| {
                    Ok(move |_: usize, neighbors: &[usize], _: &[f64]| {
                        majority_votes(labels, neighbors, num_classes)
                    })
                })?
            }
        };
        self.selection = Some(selection);
        self.data = Some(data.clone());
        Ok(())
    }

    /// Fraction of the k nearest neighbors in each class.
    fn classify_probabilistically(&self, query: &[f64]) -> Result<Vec<f64>> {
        let (Some(data), Some(selection)) = (&self.data, &self.selection) else {
            return Err(Error::UninitializedModel(
                "No training data in the classifier".to_string(),
            ));
        };
        data.check_query(query)?;
        let (neighbors, _) = nearest_neighbors(data, &self.metric, query, selection.k, |_| false);
        let mut votes = majority_votes(data.labels(), &neighbors, data.num_classes());
        normalize_or_priors(&mut votes, &data.class_priors());
        Ok(votes)
    }
}
