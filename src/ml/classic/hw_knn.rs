use super::selection::{build_graph, normalize_or_priors, select_k, KNNConfig, KSelection};
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::nearest_neighbors;
use crate::metric::{Euclidean, Metric};
use crate::ml::classifier::{Classifier, NeighborhoodSize};
use log::debug;

/// Standardization of bad occurrence counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadHubness {
    pub mean: f64,
    pub std_dev: f64,
}

impl BadHubness {
    /// Mean and population standard deviation of `bad`.
    pub fn from_counts(bad: &[u32]) -> Self {
        if bad.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let n = bad.len() as f64;
        let mean = bad.iter().map(|&b| b as f64).sum::<f64>() / n;
        let variance = bad
            .iter()
            .map(|&b| {
                let d = b as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// `exp(-h_b)` with `h_b = (bad - mean) / std`, or 1 when every point
    /// has the same bad count.
    pub fn weight(&self, bad: f64) -> f64 {
        if self.std_dev > 0.0 {
            (-(bad - self.mean) / self.std_dev).exp()
        } else {
            1.0
        }
    }
}

/// Hubness-weighted kNN: a neighbor's label counts `exp(-h_b)`, so points
/// that often appear among neighbors of other classes count less.
#[derive(Debug, Clone)]
pub struct HwKNNClassifier<M: Metric = Euclidean> {
    config: KNNConfig,
    metric: M,
    data: Option<TrainingSet>,
    selection: Option<KSelection>,
    weights: Option<Vec<f64>>,
}

impl HwKNNClassifier<Euclidean> {
    pub fn new(k: NeighborhoodSize) -> Self {
        Self::with_config(KNNConfig::new(k), Euclidean)
    }
}

impl<M: Metric> HwKNNClassifier<M> {
    pub fn with_config(config: KNNConfig, metric: M) -> Self {
        Self {
            config,
            metric,
            data: None,
            selection: None,
            weights: None,
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

    /// Per-point vote weights `exp(-h_b)` at the trained k.
    pub fn hubness_weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }
}

impl<M: Metric> Classifier for HwKNNClassifier<M> {
    fn train(&mut self, data: &TrainingSet) -> Result<()> {
        let graph = build_graph(data, &self.metric, &self.config)?;
        let labels = data.labels();
        let num_classes = data.num_classes();
        let selection = match self.config.k {
            NeighborhoodSize::Fixed(k) => KSelection { k, accuracy: None },
            NeighborhoodSize::Auto { min, max } => {
                let graph = &graph;
                select_k(graph, labels, min, max, self.config.seed, |k| {
                    let stats = graph.stats_for_k(k, labels)?;
                    let reverse = graph.reverse_neighbors(k)?;
                    let standard = BadHubness::from_counts(&stats.bad);
                    Ok(move |i: usize, neighbors: &[usize], _: &[f64]| {
                        let mut votes = vec![0.0; num_classes];
                        for &nb in neighbors {
                            // Drop i's own occurrence of nb, add the ones
                            // gained by i's reverse neighbors moving up.
                            let mut bad = stats.bad[nb] as f64;
                            if labels[i] != labels[nb] {
                                bad -= 1.0;
                            }
                            for &j in &reverse[i] {
                                if graph.neighbors(j).get(k) == Some(&nb) && labels[j] != labels[nb] {
                                    bad += 1.0;
                                }
                            }
                            votes[labels[nb]] += standard.weight(bad);
                        }
                        votes
                    })
                })?
            }
        };

        let stats = graph.stats_for_k(selection.k, labels)?;
        let standard = BadHubness::from_counts(&stats.bad);
        debug!(
            "bad hubness at k={}: mean={:.3} std={:.3}",
            selection.k, standard.mean, standard.std_dev
        );
        self.weights = Some(stats.bad.iter().map(|&b| standard.weight(b as f64)).collect());
        self.selection = Some(selection);
        self.data = Some(data.clone());
        Ok(())
    }

    fn classify_probabilistically(&self, query: &[f64]) -> Result<Vec<f64>> {
        let (Some(data), Some(selection), Some(weights)) =
            (&self.data, &self.selection, &self.weights)
        else {
            return Err(Error::UninitializedModel(
                "classifier has not been trained".to_string(),
            ));
        };
        data.check_query(query)?;
        let (neighbors, _) = nearest_neighbors(data, &self.metric, query, selection.k, |_| false);
        let mut votes = vec![0.0; data.num_classes()];
        for &nb in &neighbors {
            votes[data.label(nb)] += weights[nb];
        }
        normalize_or_priors(&mut votes, &data.class_priors());
        Ok(votes)
    }
}
