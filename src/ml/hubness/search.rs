//! Leave-one-out selection of k and the anti-hub hyperparameters.
//!
//! The graph is searched once, up to `k_max + 1` neighbors (the extra one is
//! the buffer that replaces a removed point). One immutable
//! [`OccurrenceCounts`] snapshot is derived per candidate `k`. Every
//! candidate configuration is then scored independently: each training
//! point is patched out of the snapshot through a [`LeaveOneOut`] overlay,
//! classified from its own neighbor list, and restored before the next
//! point. Candidates share nothing mutable, so the grid runs on the rayon
//! pool; each one draws its tie-breaks from its own seeded generator, which
//! keeps the outcome independent of scheduling.

use super::anti_hub::LOCAL_NEIGHBORHOOD;
use super::config::{
    validate_exponent, validate_laplace, AntiHubScheme, HubnessConfig, HyperparameterChoice,
    DEFAULT_LAPLACE_ESTIMATOR,
};
use super::leave_one_out::LeaveOneOut;
use super::occurrence::OccurrenceCounts;
use super::vote::VoteEstimator;
use super::weighting::VoteWeighting;
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::NeighborGraph;
use crate::ml::classifier::arg_max_random;
use log::{debug, info, trace};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

/// Anti-hub cutoffs tried by default.
pub const ANTI_HUB_CUTOFF_GRID: std::ops::RangeInclusive<u32> = 0..=9;

/// Distance exponents tried by default: 1.2 to 3.0 in steps of 0.2.
/// `m = 1` itself is left out, since the weighting divides by `m - 1`.
pub fn exponent_grid() -> Vec<f64> {
    (1..=10).map(|step| 1.0 + 0.2 * step as f64).collect()
}

/// The candidate configurations a search enumerates.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    pub k_min: usize,
    pub k_max: usize,
    pub anti_hub_cutoffs: Vec<u32>,
    pub schemes: Vec<AntiHubScheme>,
    pub distance_exponents: Vec<f64>,
}

impl SearchSpace {
    /// Searches k only; the other hyperparameters come from `config`.
    pub fn new(k_min: usize, k_max: usize, config: &HubnessConfig) -> Self {
        Self {
            k_min,
            k_max,
            anti_hub_cutoffs: vec![config.anti_hub_cutoff],
            schemes: vec![config.scheme],
            distance_exponents: vec![config.distance_exponent],
        }
    }

    /// The default space for a family member: the axes its weighting tunes
    /// get the full grids.
    pub fn for_weighting<W: VoteWeighting>(
        weighting: &W,
        k_min: usize,
        k_max: usize,
        config: &HubnessConfig,
    ) -> Self {
        let mut space = Self::new(k_min, k_max, config);
        if weighting.searches_anti_hubs() {
            space.anti_hub_cutoffs = ANTI_HUB_CUTOFF_GRID.collect();
            space.schemes = AntiHubScheme::ALL.to_vec();
        }
        if weighting.searches_exponent() {
            space.distance_exponents = exponent_grid();
        }
        space
    }

    pub fn with_anti_hub_cutoffs(mut self, anti_hub_cutoffs: Vec<u32>) -> Self {
        self.anti_hub_cutoffs = anti_hub_cutoffs;
        self
    }

    pub fn with_schemes(mut self, schemes: Vec<AntiHubScheme>) -> Self {
        self.schemes = schemes;
        self
    }

    pub fn with_distance_exponents(mut self, distance_exponents: Vec<f64>) -> Self {
        self.distance_exponents = distance_exponents;
        self
    }

    /// Every configuration, ordered by k, then cutoff, then scheme, then
    /// exponent.
    pub fn candidates(&self) -> Vec<HyperparameterChoice> {
        let mut candidates = Vec::new();
        for k in self.k_min..=self.k_max {
            for &anti_hub_cutoff in &self.anti_hub_cutoffs {
                for &scheme in &self.schemes {
                    for &distance_exponent in &self.distance_exponents {
                        candidates.push(HyperparameterChoice {
                            k,
                            anti_hub_cutoff,
                            scheme,
                            distance_exponent,
                            accuracy: None,
                        });
                    }
                }
            }
        }
        candidates
    }

    /// Checks the space against a training set of `n` points.
    pub fn validate(&self, n: usize) -> Result<()> {
        if self.k_min == 0 || self.k_min > self.k_max {
            return Err(Error::invalid(
                "k",
                format!(
                    "search range [{}, {}] is empty or starts at zero",
                    self.k_min, self.k_max
                ),
            ));
        }
        let limit = n.saturating_sub(1);
        if self.k_max > limit {
            return Err(Error::OutOfRange {
                what: "k",
                value: self.k_max,
                limit,
            });
        }
        if self.anti_hub_cutoffs.is_empty() {
            return Err(Error::invalid("anti_hub_cutoffs", "grid is empty"));
        }
        if self.schemes.is_empty() {
            return Err(Error::invalid("schemes", "grid is empty"));
        }
        if self.distance_exponents.is_empty() {
            return Err(Error::invalid("distance_exponents", "grid is empty"));
        }
        self.distance_exponents
            .iter()
            .try_for_each(|&m| validate_exponent(m))
    }
}

/// Neighbors the search graph needs for a range ending at `k_max` over `n`
/// points: the buffer neighbor, and enough for the local fallbacks.
pub fn required_graph_size(k_max: usize, n: usize) -> usize {
    (k_max + 1)
        .max(LOCAL_NEIGHBORHOOD)
        .min(n.saturating_sub(1))
}

#[derive(Debug, Clone)]
pub struct HyperparameterSearch<'a, W: VoteWeighting> {
    data: &'a TrainingSet,
    graph: &'a NeighborGraph,
    weighting: &'a W,
    laplace: f64,
    seed: u64,
}

impl<'a, W: VoteWeighting> HyperparameterSearch<'a, W> {
    /// `graph` must be computed over `data` with at least
    /// [`required_graph_size`] neighbors for exact leave-one-out counts; at
    /// least `k_max` are mandatory.
    pub fn new(data: &'a TrainingSet, graph: &'a NeighborGraph, weighting: &'a W) -> Self {
        Self {
            data,
            graph,
            weighting,
            laplace: DEFAULT_LAPLACE_ESTIMATOR,
            seed: 0,
        }
    }

    pub fn with_laplace_estimator(mut self, laplace: f64) -> Self {
        self.laplace = laplace;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Scores every candidate of `space` and returns the most accurate one.
    /// Among equally accurate candidates the first in enumeration order
    /// wins.
    ///
    /// # Errors
    ///
    /// - `UninitializedModel` for empty data.
    /// - `InvalidParameter` for an empty or malformed space.
    /// - `OutOfRange` if `k_max` exceeds `N - 1` or the graph's size.
    /// - `DimensionMismatch` if the graph was built over another data set.
    pub fn find_best_configuration(&self, space: &SearchSpace) -> Result<HyperparameterChoice> {
        let n = self.data.len();
        if n == 0 || self.data.num_classes() == 0 {
            return Err(Error::UninitializedModel(
                "cannot search hyperparameters without data".to_string(),
            ));
        }
        validate_laplace(self.laplace)?;
        space.validate(n)?;
        if self.graph.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: self.graph.len(),
            });
        }
        if self.graph.k() < space.k_max {
            return Err(Error::OutOfRange {
                what: "k",
                value: space.k_max,
                limit: self.graph.k(),
            });
        }

        let labels = self.data.labels();
        let num_classes = self.data.num_classes();
        let snapshots = (space.k_min..=space.k_max)
            .into_par_iter()
            .map(|k| OccurrenceCounts::from_graph(self.graph, labels, num_classes, k))
            .collect::<Result<Vec<_>>>()?;

        let candidates = space.candidates();
        debug!(
            "leave-one-out search over {} candidates, k in [{}, {}], n={}",
            candidates.len(),
            space.k_min,
            space.k_max,
            n
        );
        let priors = self.data.class_priors();
        let accuracies: Vec<f64> = candidates
            .par_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let snapshot = &snapshots[candidate.k - space.k_min];
                self.leave_one_out_accuracy(snapshot, candidate, &priors, index as u64)
            })
            .collect();

        let mut best = 0;
        for (index, &accuracy) in accuracies.iter().enumerate() {
            trace!("{} -> {:.4}", candidates[index], accuracy);
            if accuracy > accuracies[best] {
                best = index;
            }
        }
        let choice = HyperparameterChoice {
            accuracy: Some(accuracies[best]),
            ..candidates[best]
        };
        info!("selected {}", choice);
        Ok(choice)
    }

    /// Fraction of training points the candidate classifies correctly when
    /// each is left out of the occurrence tables in turn. `stream` selects
    /// the tie-break generator.
    pub fn leave_one_out_accuracy(
        &self,
        snapshot: &OccurrenceCounts,
        candidate: &HyperparameterChoice,
        priors: &[f64],
        stream: u64,
    ) -> f64 {
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed.wrapping_add(stream));
        let estimator = VoteEstimator::from_choice(self.weighting.clone(), candidate);
        let labels = self.data.labels();
        let mut view = LeaveOneOut::new(snapshot, self.graph, labels, self.laplace);

        let k = snapshot.k();
        let mut correct = 0usize;
        for (i, &label) in labels.iter().enumerate() {
            let neighbors = self.graph.neighbors(i);
            let take = k.min(neighbors.len());
            view.patch(i);
            let probs = estimator.estimate(
                &view,
                &neighbors[..take],
                &self.graph.distances(i)[..take],
                priors,
            );
            view.restore();
            if arg_max_random(&probs, &mut rng) == label {
                correct += 1;
            }
        }
        correct as f64 / labels.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Euclidean;
    use crate::ml::classifier::{Classifier, NeighborhoodSize};
    use crate::ml::hubness::classifier::DWHFNN;
    use crate::ml::hubness::weighting::{Informative, InverseDistance, Uniform};

    fn blobs() -> TrainingSet {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            let t = i as f64 * 0.1;
            features.push(vec![t, 0.05 * t]);
            labels.push(0);
            features.push(vec![50.0 + t, 50.0 - 0.05 * t]);
            labels.push(1);
        }
        TrainingSet::new(features, labels).unwrap()
    }

    /// Two overlapping classes with no tied distances.
    fn overlapping() -> TrainingSet {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.7, 0.3],
            vec![1.1, 1.6],
            vec![0.3, 2.2],
            vec![2.4, 0.5],
            vec![1.9, 1.3],
            vec![2.8, 2.1],
            vec![3.6, 0.9],
            vec![1.4, 3.0],
            vec![3.3, 3.4],
            vec![4.2, 2.6],
            vec![0.6, 3.9],
            vec![2.2, 4.3],
            vec![4.5, 4.0],
        ];
        let labels = vec![0, 0, 1, 0, 1, 0, 1, 1, 0, 1, 1, 0, 0, 1];
        TrainingSet::new(features, labels).unwrap()
    }

    #[test]
    fn test_default_grids() {
        assert_eq!(exponent_grid().len(), 10);
        assert!((exponent_grid()[0] - 1.2).abs() < 1e-12);
        assert!((exponent_grid()[9] - 3.0).abs() < 1e-12);
        assert!(exponent_grid().iter().all(|&m| m > 1.0));

        let config = HubnessConfig::default();
        let hfnn = SearchSpace::for_weighting(&Uniform, 1, 5, &config);
        assert_eq!(hfnn.anti_hub_cutoffs, (0..=9).collect::<Vec<_>>());
        assert_eq!(hfnn.schemes.len(), 4);
        assert_eq!(hfnn.distance_exponents, vec![2.0]);
        assert_eq!(hfnn.candidates().len(), 5 * 10 * 4);

        let dwh = SearchSpace::for_weighting(&InverseDistance, 1, 2, &config);
        assert_eq!(dwh.candidates().len(), 2 * 10 * 4 * 10);

        let hiknn = SearchSpace::for_weighting(&Informative, 2, 4, &config);
        assert_eq!(hiknn.candidates().len(), 3);
    }

    #[test]
    fn test_candidate_order() {
        let config = HubnessConfig::default();
        let space = SearchSpace::new(1, 2, &config)
            .with_anti_hub_cutoffs(vec![0, 1])
            .with_schemes(vec![AntiHubScheme::Global, AntiHubScheme::Label]);
        let order: Vec<(usize, u32, AntiHubScheme)> = space
            .candidates()
            .iter()
            .map(|c| (c.k, c.anti_hub_cutoff, c.scheme))
            .collect();
        assert_eq!(order[0], (1, 0, AntiHubScheme::Global));
        assert_eq!(order[1], (1, 0, AntiHubScheme::Label));
        assert_eq!(order[2], (1, 1, AntiHubScheme::Global));
        assert_eq!(order[4], (2, 0, AntiHubScheme::Global));
    }

    #[test]
    fn test_required_graph_size() {
        assert_eq!(required_graph_size(5, 100), 10);
        assert_eq!(required_graph_size(12, 100), 13);
        assert_eq!(required_graph_size(5, 7), 6);
    }

    #[test]
    fn test_separable_blobs_reach_full_accuracy() {
        let data = blobs();
        let graph =
            NeighborGraph::compute(&data, &Euclidean, required_graph_size(5, data.len())).unwrap();
        let config = HubnessConfig::new(NeighborhoodSize::Auto { min: 1, max: 5 });
        let space = SearchSpace::for_weighting(&Uniform, 1, 5, &config);
        let choice = HyperparameterSearch::new(&data, &graph, &Uniform)
            .find_best_configuration(&space)
            .unwrap();
        assert_eq!(choice.accuracy, Some(1.0));
        assert!((1..=5).contains(&choice.k));
        // k = 1 is perfect already and comes first in enumeration order.
        assert_eq!(choice.k, 1);
        assert_eq!(choice.anti_hub_cutoff, 0);
        assert_eq!(choice.scheme, AntiHubScheme::Global);
    }

    #[test]
    fn test_leave_one_out_accuracy_matches_retraining() {
        let data = overlapping();
        let n = data.len();
        let graph = NeighborGraph::compute(&data, &Euclidean, required_graph_size(3, n)).unwrap();
        let search = HyperparameterSearch::new(&data, &graph, &InverseDistance);
        let priors = data.class_priors();

        for k in 2..=3 {
            let snapshot = OccurrenceCounts::from_graph(&graph, data.labels(), 2, k).unwrap();
            for cutoff in 0..=3 {
                for scheme in [AntiHubScheme::Global, AntiHubScheme::Label] {
                    for exponent in [1.6, 2.0] {
                        let config = HubnessConfig::new(NeighborhoodSize::Fixed(k))
                            .with_anti_hub_cutoff(cutoff)
                            .with_scheme(scheme)
                            .with_distance_exponent(exponent);
                        let candidate = HyperparameterChoice::fixed(&config, k);

                        let mut correct = 0;
                        for i in 0..n {
                            let keep: Vec<usize> = (0..n).filter(|&p| p != i).collect();
                            let reduced = TrainingSet::with_classes(
                                keep.iter().map(|&p| data.point(p).to_vec()).collect(),
                                keep.iter().map(|&p| data.label(p)).collect(),
                                2,
                            )
                            .unwrap();
                            let mut retrained = DWHFNN::with_config(config.clone(), Euclidean);
                            retrained.train(&reduced).unwrap();
                            if retrained.classify(data.point(i)).unwrap() == data.label(i) {
                                correct += 1;
                            }
                        }
                        let expected = correct as f64 / n as f64;
                        let accuracy = search.leave_one_out_accuracy(&snapshot, &candidate, &priors, 0);
                        assert_eq!(accuracy, expected, "{candidate}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_search_is_reproducible() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        // Interleaved classes make plenty of tied votes.
        for i in 0..16 {
            features.push(vec![i as f64, (i % 3) as f64]);
            labels.push(i % 2);
        }
        let data = TrainingSet::new(features, labels).unwrap();
        let graph =
            NeighborGraph::compute(&data, &Euclidean, required_graph_size(6, data.len())).unwrap();
        let config = HubnessConfig::default();
        let space = SearchSpace::for_weighting(&InverseDistance, 2, 6, &config);
        let search = HyperparameterSearch::new(&data, &graph, &InverseDistance).with_seed(11);
        let first = search.find_best_configuration(&space).unwrap();
        let second = search.find_best_configuration(&space).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejects_bad_spaces() {
        let data = blobs();
        let graph = NeighborGraph::compute(&data, &Euclidean, 11).unwrap();
        let config = HubnessConfig::default();
        let search = HyperparameterSearch::new(&data, &graph, &Uniform);

        let too_big = SearchSpace::new(1, 12, &config);
        assert!(matches!(
            search.find_best_configuration(&too_big),
            Err(Error::OutOfRange { .. })
        ));
        let empty = SearchSpace::new(3, 2, &config);
        assert!(matches!(
            search.find_best_configuration(&empty),
            Err(Error::InvalidParameter { .. })
        ));
        let no_schemes = SearchSpace::new(1, 2, &config).with_schemes(vec![]);
        assert!(search.find_best_configuration(&no_schemes).is_err());
        let bad_m = SearchSpace::new(1, 2, &config).with_distance_exponents(vec![1.0]);
        assert!(search.find_best_configuration(&bad_m).is_err());

        let small_graph = NeighborGraph::compute(&data, &Euclidean, 2).unwrap();
        let search = HyperparameterSearch::new(&data, &small_graph, &Uniform);
        assert!(matches!(
            search.find_best_configuration(&SearchSpace::new(1, 3, &config)),
            Err(Error::OutOfRange { .. })
        ));
    }
}
