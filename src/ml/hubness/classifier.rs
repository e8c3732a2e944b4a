use super::config::{HubnessConfig, HyperparameterChoice};
use super::search::{required_graph_size, HyperparameterSearch, SearchSpace};
use super::trainer::{ModelTrainer, TrainedModel};
use super::vote::VoteEstimator;
use super::weighting::{Informative, InverseDistance, Uniform, VoteWeighting};
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::{nearest_neighbors, NeighborGraph};
use crate::metric::{Euclidean, Metric};
use crate::ml::classifier::{Classifier, NeighborhoodSize};
use log::debug;

/// Hubness-aware fuzzy kNN classifier.
///
/// A neighbor votes with its class-occurrence profile rather than its label,
/// so hubs that show up in the neighborhoods of many classes say so. Rarely
/// occurring neighbors fall back to an [`AntiHubScheme`](super::AntiHubScheme).
/// The weighting plug-in `W` selects the family member; see [`HFNN`],
/// [`DWHFNN`] and [`HIKNN`].
///
/// # Example
///
/// ```
/// use hubknn::{Classifier, NeighborhoodSize, TrainingSet, HFNN};
///
/// let data = TrainingSet::new(
///     vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0], vec![11.0], vec![12.0]],
///     vec![0, 0, 0, 1, 1, 1],
/// )
/// .unwrap();
/// let mut hfnn = HFNN::new(NeighborhoodSize::Fixed(3));
/// hfnn.train(&data).unwrap();
/// assert_eq!(hfnn.classify(&[1.5]).unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct HubnessFuzzyClassifier<W: VoteWeighting, M: Metric = Euclidean> {
    config: HubnessConfig,
    weighting: W,
    metric: M,
    search_space: Option<SearchSpace>,
    data: Option<TrainingSet>,
    model: Option<TrainedModel>,
    estimator: Option<VoteEstimator<W>>,
    choice: Option<HyperparameterChoice>,
}

/// h-FNN: every neighbor weighs the same.
pub type HFNN<M = Euclidean> = HubnessFuzzyClassifier<Uniform, M>;
/// dwh-FNN: neighbors weighted by inverse distance.
pub type DWHFNN<M = Euclidean> = HubnessFuzzyClassifier<InverseDistance, M>;
/// HIKNN: inverse distance scaled by occurrence informativeness.
pub type HIKNN<M = Euclidean> = HubnessFuzzyClassifier<Informative, M>;

impl<W: VoteWeighting> HubnessFuzzyClassifier<W, Euclidean> {
    /// Default configuration with the given neighborhood size under the
    /// Euclidean metric.
    pub fn new(k: NeighborhoodSize) -> Self {
        let scheme = W::default().default_scheme();
        Self::with_config(HubnessConfig::new(k).with_scheme(scheme), Euclidean)
    }
}

impl<W: VoteWeighting, M: Metric> HubnessFuzzyClassifier<W, M> {
    pub fn with_config(config: HubnessConfig, metric: M) -> Self {
        Self {
            config,
            weighting: W::default(),
            metric,
            search_space: None,
            data: None,
            model: None,
            estimator: None,
            choice: None,
        }
    }

    /// Replaces the space searched when training. Without one,
    /// `NeighborhoodSize::Auto` searches the default grids of `W`; with one,
    /// its k range wins over the configured neighborhood size.
    pub fn with_search_space(mut self, space: SearchSpace) -> Self {
        self.search_space = Some(space);
        self
    }

    pub fn config(&self) -> &HubnessConfig {
        &self.config
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Hyperparameters of the trained model.
    pub fn choice(&self) -> Option<&HyperparameterChoice> {
        self.choice.as_ref()
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn trained(&self) -> Result<(&TrainingSet, &TrainedModel, &VoteEstimator<W>)> {
        match (&self.data, &self.model, &self.estimator) {
            (Some(data), Some(model), Some(estimator)) => Ok((data, model, estimator)),
            _ => Err(Error::UninitializedModel(
                "classifier has not been trained".to_string(),
            )),
        }
    }

    /// Class probabilities from neighbors found elsewhere, nearest first.
    ///
    /// # Errors
    ///
    /// - `UninitializedModel` before training.
    /// - `DimensionMismatch` if the two slices differ in length.
    /// - `OutOfRange` for an index outside the training set.
    pub fn classify_with_neighbors(
        &self,
        neighbors: &[usize],
        distances: &[f64],
    ) -> Result<Vec<f64>> {
        let (data, model, estimator) = self.trained()?;
        if neighbors.len() != distances.len() {
            return Err(Error::DimensionMismatch {
                expected: neighbors.len(),
                actual: distances.len(),
            });
        }
        if let Some(&bad) = neighbors.iter().find(|&&nb| nb >= data.len()) {
            return Err(Error::OutOfRange {
                what: "neighbor index",
                value: bad,
                limit: data.len(),
            });
        }
        Ok(estimator.estimate(model, neighbors, distances, model.class_priors()))
    }

    fn select(&self, data: &TrainingSet) -> Result<(NeighborGraph, HyperparameterChoice)> {
        let n = data.len();
        let space = match (&self.search_space, self.config.k) {
            (Some(space), _) => space.clone(),
            (None, NeighborhoodSize::Auto { min, max }) => {
                SearchSpace::for_weighting(&self.weighting, min, max, &self.config)
            }
            (None, NeighborhoodSize::Fixed(k)) => {
                let graph = NeighborGraph::compute(data, &self.metric, k)?;
                return Ok((graph, HyperparameterChoice::fixed(&self.config, k)));
            }
        };
        space.validate(n)?;

        let graph = NeighborGraph::compute(data, &self.metric, required_graph_size(space.k_max, n))?;
        let choice = HyperparameterSearch::new(data, &graph, &self.weighting)
            .with_laplace_estimator(self.config.laplace_estimator)
            .with_seed(self.config.seed)
            .find_best_configuration(&space)?;
        Ok((graph, choice))
    }
}

impl<W: VoteWeighting, M: Metric> Classifier for HubnessFuzzyClassifier<W, M> {
    /// # Errors
    ///
    /// - `UninitializedModel` for an empty training set.
    /// - `InvalidParameter` for a bad configuration or search space.
    /// - `OutOfRange` if the neighborhood size exceeds `N - 1`.
    fn train(&mut self, data: &TrainingSet) -> Result<()> {
        if data.is_empty() || data.num_classes() == 0 {
            return Err(Error::UninitializedModel(
                "cannot train on an empty training set".to_string(),
            ));
        }
        self.config.validate()?;
        if self.search_space.is_none() {
            self.config.k.validate(data.len())?;
        }

        let (graph, choice) = self.select(data)?;
        let model = ModelTrainer::new(data, &self.metric)
            .with_laplace_estimator(self.config.laplace_estimator)
            .with_anti_hub_cutoff(choice.anti_hub_cutoff)
            .train_with_graph(&graph, choice.k)?;
        debug!("trained with {}", choice);

        self.estimator = Some(VoteEstimator::from_choice(self.weighting.clone(), &choice));
        self.model = Some(model);
        self.choice = Some(choice);
        self.data = Some(data.clone());
        Ok(())
    }

    fn classify_probabilistically(&self, query: &[f64]) -> Result<Vec<f64>> {
        let (data, model, estimator) = self.trained()?;
        data.check_query(query)?;
        let (neighbors, distances) = nearest_neighbors(data, &self.metric, query, model.k(), |_| false);
        Ok(estimator.estimate(model, &neighbors, &distances, model.class_priors()))
    }
}
