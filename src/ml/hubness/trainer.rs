use super::anti_hub::{fill_label, local_size, LocalDistributions};
use super::config::{validate_laplace, AntiHubScheme, DEFAULT_LAPLACE_ESTIMATOR};
use super::occurrence::{smoothed_prior, smoothed_relation, OccurrenceCounts, OccurrenceModel};
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::NeighborGraph;
use crate::metric::Metric;
use log::{debug, trace};
use ndarray::Array2;

/// Builds [`TrainedModel`]s from a training set.
///
/// # Example
///
/// ```
/// use hubknn::{Euclidean, ModelTrainer, TrainingSet};
///
/// let data = TrainingSet::new(
///     vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0], vec![11.0], vec![12.0]],
///     vec![0, 0, 0, 1, 1, 1],
/// )
/// .unwrap();
/// let model = ModelTrainer::new(&data, &Euclidean).train(3).unwrap();
/// assert_eq!(model.k(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ModelTrainer<'a, M: Metric> {
    data: &'a TrainingSet,
    metric: &'a M,
    laplace: f64,
    anti_hub_cutoff: u32,
}

impl<'a, M: Metric> ModelTrainer<'a, M> {
    pub fn new(data: &'a TrainingSet, metric: &'a M) -> Self {
        Self {
            data,
            metric,
            laplace: DEFAULT_LAPLACE_ESTIMATOR,
            anti_hub_cutoff: 0,
        }
    }

    pub fn with_laplace_estimator(mut self, laplace: f64) -> Self {
        self.laplace = laplace;
        self
    }

    pub fn with_anti_hub_cutoff(mut self, anti_hub_cutoff: u32) -> Self {
        self.anti_hub_cutoff = anti_hub_cutoff;
        self
    }

    /// Computes the `k`-NN graph and trains on it.
    ///
    /// # Errors
    ///
    /// See [`ModelTrainer::train_with_graph`].
    pub fn train(&self, k: usize) -> Result<TrainedModel> {
        self.check_data()?;
        let graph = NeighborGraph::compute(self.data, self.metric, k)?;
        self.train_with_graph(&graph, k)
    }

    fn check_data(&self) -> Result<()> {
        if self.data.is_empty() || self.data.num_classes() == 0 {
            return Err(Error::UninitializedModel(
                "no training data to build occurrence tables from".to_string(),
            ));
        }
        Ok(())
    }

    /// Trains at `k` on an already computed graph holding at least `k`
    /// neighbors per point.
    ///
    /// # Errors
    ///
    /// - `UninitializedModel` for empty data or zero classes.
    /// - `InvalidParameter` for `k == 0` or a bad Laplace estimator.
    /// - `OutOfRange` if `k` exceeds `N - 1` or the graph's size.
    /// - `DimensionMismatch` if the graph was built over another data set.
    pub fn train_with_graph(&self, graph: &NeighborGraph, k: usize) -> Result<TrainedModel> {
        self.check_data()?;
        validate_laplace(self.laplace)?;
        if k == 0 {
            return Err(Error::invalid("k", "neighborhood size must be positive"));
        }
        let n = self.data.len();
        if k > n - 1 {
            return Err(Error::OutOfRange {
                what: "k",
                value: k,
                limit: n - 1,
            });
        }
        if graph.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                actual: graph.len(),
            });
        }

        let num_classes = self.data.num_classes();
        let labels = self.data.labels();
        let laplace = self.laplace;
        let counts = OccurrenceCounts::from_graph(graph, labels, num_classes, k)?;

        let mut class_relation = Array2::<f64>::zeros((num_classes, n));
        for ((c, p), value) in class_relation.indexed_iter_mut() {
            *value = smoothed_relation(
                counts.class_count(c, p) as f64,
                counts.occurrence(p) as f64,
                num_classes,
                laplace,
            );
        }

        let mut class_to_class = Array2::<f64>::zeros((num_classes, num_classes));
        for ((a, b), value) in class_to_class.indexed_iter_mut() {
            *value = smoothed_prior(
                counts.class_to_class(a, b) as f64,
                counts.class_hubness(a) as f64,
                num_classes,
                laplace,
            );
        }

        let size = local_size(k, n);
        let mut local = vec![None; n];
        let mut anti_hubs = 0usize;
        for (p, slot) in local.iter_mut().enumerate() {
            if counts.occurrence(p) > self.anti_hub_cutoff {
                continue;
            }
            let neighborhood = graph.extended_neighbors(self.data, self.metric, p, size)?;
            let neighbor_labels: Vec<usize> = neighborhood.iter().map(|&j| labels[j]).collect();
            *slot = Some(LocalDistributions::compute(
                labels[p],
                &neighbor_labels,
                num_classes,
                laplace,
            ));
            anti_hubs += 1;
        }
        debug!(
            "trained occurrence model: n={} k={} classes={} anti-hubs={} (theta={})",
            n, k, num_classes, anti_hubs, self.anti_hub_cutoff
        );

        Ok(TrainedModel {
            k,
            laplace,
            anti_hub_cutoff: self.anti_hub_cutoff,
            num_classes,
            labels: labels.to_vec(),
            occurrence: counts.stats().occurrence.clone(),
            max_occurrence: counts.max_occurrence(),
            class_relation,
            class_to_class,
            local,
            class_priors: self.data.class_priors(),
        })
    }
}

/// Smoothed occurrence tables of a training set at one `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    k: usize,
    laplace: f64,
    anti_hub_cutoff: u32,
    num_classes: usize,
    labels: Vec<usize>,
    occurrence: Vec<u32>,
    max_occurrence: u32,
    /// [class, point]
    class_relation: Array2<f64>,
    /// [neighbor class, query class]
    class_to_class: Array2<f64>,
    local: Vec<Option<LocalDistributions>>,
    class_priors: Vec<f64>,
}

impl TrainedModel {
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn laplace_estimator(&self) -> f64 {
        self.laplace
    }

    pub fn anti_hub_cutoff(&self) -> u32 {
        self.anti_hub_cutoff
    }

    pub fn class_relation(&self) -> &Array2<f64> {
        &self.class_relation
    }

    pub fn class_to_class_priors(&self) -> &Array2<f64> {
        &self.class_to_class
    }

    /// Local fallbacks of `point`, present for anti-hubs only.
    pub fn local_distributions(&self, point: usize) -> Option<&LocalDistributions> {
        self.local[point].as_ref()
    }

    pub fn is_anti_hub(&self, point: usize) -> bool {
        self.occurrence[point] <= self.anti_hub_cutoff
    }

    pub fn class_priors(&self) -> &[f64] {
        &self.class_priors
    }

    fn fill_global(&self, point: usize, out: &mut [f64]) {
        let row = self.class_to_class.row(self.labels[point]);
        for (o, &v) in out.iter_mut().zip(row.iter()) {
            *o = v;
        }
    }
}

impl OccurrenceModel for TrainedModel {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn num_points(&self) -> usize {
        self.labels.len()
    }

    fn label(&self, point: usize) -> usize {
        self.labels[point]
    }

    fn occurrence(&self, point: usize) -> u32 {
        self.occurrence[point]
    }

    fn max_occurrence(&self) -> u32 {
        self.max_occurrence
    }

    fn occurrence_profile(&self, point: usize, out: &mut [f64]) {
        let column = self.class_relation.column(point);
        for (o, &v) in out.iter_mut().zip(column.iter()) {
            *o = v;
        }
    }

    fn anti_hub_profile(&self, scheme: AntiHubScheme, point: usize, out: &mut [f64]) {
        if scheme == AntiHubScheme::Global {
            return self.fill_global(point, out);
        }
        match self.local[point].as_ref().and_then(|d| d.get(scheme)) {
            Some(dist) => out.copy_from_slice(dist),
            None if scheme == AntiHubScheme::Label => {
                fill_label(out, self.labels[point], self.laplace)
            }
            None => {
                trace!("no {} table for point {}, using GLOBAL", scheme, point);
                self.fill_global(point, out);
            }
        }
    }
}
