use super::selection::{build_graph, normalize_or_priors, select_k, KNNConfig, KSelection};
use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::graph::{nearest_neighbors, NeighborGraph};
use crate::metric::{Euclidean, Metric};
use crate::ml::classifier::{Classifier, NeighborhoodSize};
use crate::ml::hubness::anti_hub::fuzzify;
use crate::ml::hubness::weighting::inverse_distance_weights;
use log::debug;
use ndarray::Array2;

/// Keller's fuzzy kNN.
///
/// Every training point gets a fuzzy class membership from its own
/// k-neighborhood, `0.51 + 0.49·n_c/k` for its label and `0.49·n_c/k` for
/// the other classes. A query sums its neighbors' memberships weighted by
/// `1 / d^(2/(m-1))`.
#[derive(Debug, Clone)]
pub struct FNNClassifier<M: Metric = Euclidean> {
    config: KNNConfig,
    metric: M,
    data: Option<TrainingSet>,
    selection: Option<KSelection>,
    /// [point, class]
    memberships: Option<Array2<f64>>,
}

impl FNNClassifier<Euclidean> {
    pub fn new(k: NeighborhoodSize) -> Self {
        Self::with_config(KNNConfig::new(k), Euclidean)
    }
}

impl<M: Metric> FNNClassifier<M> {
    pub fn with_config(config: KNNConfig, metric: M) -> Self {
        Self {
            config,
            metric,
            data: None,
            selection: None,
            memberships: None,
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

    /// Fuzzy class memberships of the training points, once trained.
    pub fn memberships(&self) -> Option<&Array2<f64>> {
        self.memberships.as_ref()
    }
}

/// Keller membership of a point with label `own_label` from the labels of
/// its neighbors.
pub fn fuzzy_membership<I>(out: &mut [f64], own_label: usize, neighbor_labels: I)
where
    I: IntoIterator<Item = usize>,
{
    out.fill(0.0);
    let mut count = 0usize;
    for label in neighbor_labels {
        out[label] += 1.0;
        count += 1;
    }
    if count == 0 {
        out[own_label] = 1.0;
        return;
    }
    for p in out.iter_mut() {
        *p /= count as f64;
    }
    fuzzify(out, own_label);
}

/// Membership of `point` from its first `k` graph neighbors other than
/// `left_out`.
fn graph_membership(
    out: &mut [f64],
    graph: &NeighborGraph,
    labels: &[usize],
    point: usize,
    k: usize,
    left_out: Option<usize>,
) {
    let neighbor_labels = graph
        .neighbors(point)
        .iter()
        .filter(|&&j| Some(j) != left_out)
        .take(k)
        .map(|&j| labels[j]);
    fuzzy_membership(out, labels[point], neighbor_labels);
}

fn accumulate<F>(
    neighbors: &[usize],
    distances: &[f64],
    exponent: f64,
    num_classes: usize,
    mut membership: F,
) -> Vec<f64>
where
    F: FnMut(usize, &mut [f64]),
{
    let mut weights = Vec::with_capacity(distances.len());
    inverse_distance_weights(distances, exponent, &mut weights);
    let mut votes = vec![0.0; num_classes];
    let mut profile = vec![0.0; num_classes];
    for (&nb, &w) in neighbors.iter().zip(weights.iter()) {
        membership(nb, &mut profile);
        for (v, &p) in votes.iter_mut().zip(profile.iter()) {
            *v += w * p;
        }
    }
    votes
}

impl<M: Metric> Classifier for FNNClassifier<M> {
    fn train(&mut self, data: &TrainingSet) -> Result<()> {
        let graph = build_graph(data, &self.metric, &self.config)?;
        let labels = data.labels();
        let num_classes = data.num_classes();
        let exponent = self.config.distance_exponent;
        let selection = match self.config.k {
            NeighborhoodSize::Fixed(k) => KSelection { k, accuracy: None },
            NeighborhoodSize::Auto { min, max } => {
                let graph = &graph;
                select_k(graph, labels, min, max, self.config.seed, |k| {
                    Ok(move |i: usize, neighbors: &[usize], distances: &[f64]| {
                        accumulate(neighbors, distances, exponent, num_classes, |nb, out| {
                            graph_membership(out, graph, labels, nb, k, Some(i))
                        })
                    })
                })?
            }
        };

        let mut memberships = Array2::<f64>::zeros((data.len(), num_classes));
        let mut row = vec![0.0; num_classes];
        for (p, mut target) in memberships.rows_mut().into_iter().enumerate() {
            graph_membership(&mut row, &graph, labels, p, selection.k, None);
            for (t, &v) in target.iter_mut().zip(row.iter()) {
                *t = v;
            }
        }
        debug!("fuzzy memberships computed at k={}", selection.k);

        self.memberships = Some(memberships);
        self.selection = Some(selection);
        self.data = Some(data.clone());
        Ok(())
    }

    fn classify_probabilistically(&self, query: &[f64]) -> Result<Vec<f64>> {
        let (Some(data), Some(selection), Some(memberships)) =
            (&self.data, &self.selection, &self.memberships)
        else {
            return Err(Error::UninitializedModel(
                "classifier has not been trained".to_string(),
            ));
        };
        data.check_query(query)?;
        let (neighbors, distances) =
            nearest_neighbors(data, &self.metric, query, selection.k, |_| false);
        let mut votes = accumulate(
            &neighbors,
            &distances,
            self.config.distance_exponent,
            data.num_classes(),
            |nb, out| {
                for (o, &v) in out.iter_mut().zip(memberships.row(nb).iter()) {
                    *o = v;
                }
            },
        );
        normalize_or_priors(&mut votes, &data.class_priors());
        Ok(votes)
    }
}
