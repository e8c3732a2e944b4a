use super::selection::{build_graph, normalize_or_priors, select_k, KNNConfig, KSelection};
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::nearest_neighbors;
use crate::metric::{Euclidean, Metric};
use crate::ml::classifier::{Classifier, NeighborhoodSize};
use crate::ml::hubness::weighting::inverse_distance_weights;

/// Distance-weighted kNN: each neighbor's label counts `1 / d^(2/(m-1))`.
#[derive(Debug, Clone)]
pub struct DWKNNClassifier<M: Metric = Euclidean> {
    config: KNNConfig,
    metric: M,
    data: Option<TrainingSet>,
    selection: Option<KSelection>,
}

impl DWKNNClassifier<Euclidean> {
    pub fn new(k: NeighborhoodSize) -> Self {
        Self::with_config(KNNConfig::new(k), Euclidean)
    }
}

impl<M: Metric> DWKNNClassifier<M> {
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

    pub fn k(&self) -> Option<usize> {
        self.selection.map(|s| s.k)
    }

    pub fn selection(&self) -> Option<&KSelection> {
        self.selection.as_ref()
    }
}

/// Per-class sums of the neighbors' normalized inverse-distance weights.
pub(crate) fn weighted_votes(
    labels: &[usize],
    neighbors: &[usize],
    distances: &[f64],
    exponent: f64,
    num_classes: usize,
) -> Vec<f64> {
    let mut weights = Vec::with_capacity(distances.len());
    inverse_distance_weights(distances, exponent, &mut weights);
    let mut votes = vec![0.0; num_classes];
    for (&nb, &w) in neighbors.iter().zip(weights.iter()) {
        votes[labels[nb]] += w;
    }
    votes
}

impl<M: Metric> Classifier for DWKNNClassifier<M> {
    fn train(&mut self, data: &TrainingSet) -> Result<()> {
        let graph = build_graph(data, &self.metric, &self.config)?;
        let labels = data.labels();
        let num_classes = data.num_classes();
        let exponent = self.config.distance_exponent;
        let selection = match self.config.k {
            NeighborhoodSize::Fixed(k) => KSelection { k, accuracy: None },
            NeighborhoodSize::Auto { min, max } => {
                select_k(&graph, labels, min, max, self.config.seed, |_| {
                    Ok(move |_: usize, neighbors: &[usize], distances: &[f64]| {
                        weighted_votes(labels, neighbors, distances, exponent, num_classes)
                    })
                })?
            }
        };
        self.selection = Some(selection);
        self.data = Some(data.clone());
        Ok(())
    }

    fn classify_probabilistically(&self, query: &[f64]) -> Result<Vec<f64>> {
        let (Some(data), Some(selection)) = (&self.data, &self.selection) else {
            return Err(Error::UninitializedModel(
                "classifier has not been trained".to_string(),
            ));
        };
        data.check_query(query)?;
        let (neighbors, distances) =
            nearest_neighbors(data, &self.metric, query, selection.k, |_| false);
        let mut votes = weighted_votes(
            data.labels(),
            &neighbors,
            &distances,
            self.config.distance_exponent,
            data.num_classes(),
        );
        normalize_or_priors(&mut votes, &data.class_priors());
        Ok(votes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classic::KNNClassifier;
    use approx::assert_relative_eq;

    fn skewed() -> TrainingSet {
        // A class 1 point right next to the query, two class 0 points further out.
        TrainingSet::new(
            vec![vec![0.1], vec![1.0], vec![-1.0], vec![8.0]],
            vec![1, 0, 0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_close_neighbor_outweighs_majority() {
        let data = skewed();
        let mut knn = KNNClassifier::new(NeighborhoodSize::Fixed(3));
        knn.train(&data).unwrap();
        assert_eq!(knn.classify(&[0.0]).unwrap(), 0);

        let mut dwknn = DWKNNClassifier::new(NeighborhoodSize::Fixed(3));
        dwknn.train(&data).unwrap();
        assert_eq!(dwknn.classify(&[0.0]).unwrap(), 1);

        let probs = dwknn.classify_probabilistically(&[0.0]).unwrap();
        let w = [100.0, 1.0, 1.0];
        assert_relative_eq!(probs[1], w[0] / 102.0, epsilon = 1e-9);
    }

    #[test]
    fn test_exact_match_gets_fixed_weight() {
        let data = skewed();
        let mut dwknn = DWKNNClassifier::new(NeighborhoodSize::Fixed(2));
        dwknn.train(&data).unwrap();
        let probs = dwknn.classify_probabilistically(&[1.0]).unwrap();
        // 10000 against 1 / 0.81
        let far = 1.0 / 0.81;
        assert_relative_eq!(probs[0], 10000.0 / (10000.0 + far), epsilon = 1e-9);
    }

    #[test]
    fn test_underflow_returns_priors() {
        let data = skewed();
        let config = KNNConfig::new(NeighborhoodSize::Fixed(2)).with_distance_exponent(1.01);
        let mut dwknn = DWKNNClassifier::with_config(config, Euclidean);
        dwknn.train(&data).unwrap();
        let probs = dwknn.classify_probabilistically(&[1.0e7]).unwrap();
        assert_eq!(probs, vec![0.5, 0.5]);
    }

    #[test]
    fn test_invalid_exponent() {
        let config = KNNConfig::new(NeighborhoodSize::Fixed(2)).with_distance_exponent(1.0);
        let mut dwknn = DWKNNClassifier::with_config(config, Euclidean);
        assert!(matches!(
            dwknn.train(&skewed()),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
