//! Simulated removal of one training point from the occurrence tables.
//!
//! Removing point `i` from the training set changes the counts in two ways:
//! `i`'s own neighborhood no longer contributes, and every reverse neighbor
//! `j` of `i` drops `i` and pulls its next nearest point (the buffer
//! neighbor at position `k`) into its neighborhood. Both effects touch at most
//! `k + |reverse(i)|` entries, so they are recorded in a small delta overlay
//! on top of the immutable per-k snapshot instead of rebuilding the tables.
//! [`LeaveOneOut::restore`] drops the overlay, which returns the view to the
//! snapshot exactly.

use super::anti_hub::{fill_label, fill_local, fuzzify, LOCAL_NEIGHBORHOOD};
use super::config::AntiHubScheme;
use super::occurrence::{smoothed_prior, smoothed_relation, OccurrenceCounts, OccurrenceModel};
use crate::graph::NeighborGraph;
use ndarray::Array2;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct PointDelta {
    occurrence: i64,
    by_class: Vec<i64>,
}

/// An [`OccurrenceModel`] over a snapshot with at most one point left out.
#[derive(Debug, Clone)]
pub struct LeaveOneOut<'a> {
    counts: &'a OccurrenceCounts,
    graph: &'a NeighborGraph,
    labels: &'a [usize],
    laplace: f64,
    local_size: usize,
    left_out: Option<usize>,
    point_deltas: HashMap<usize, PointDelta>,
    class_to_class_delta: Array2<i64>,
    class_hubness_delta: Vec<i64>,
}

impl<'a> LeaveOneOut<'a> {
    /// `graph` must hold at least `counts.k()` neighbors per point; one more
    /// lets reverse neighbors fill the gap left by the removed point.
    pub fn new(
        counts: &'a OccurrenceCounts,
        graph: &'a NeighborGraph,
        labels: &'a [usize],
        laplace: f64,
    ) -> Self {
        let num_classes = counts.num_classes();
        Self {
            counts,
            graph,
            labels,
            laplace,
            local_size: counts.k().max(LOCAL_NEIGHBORHOOD).min(graph.k()),
            left_out: None,
            point_deltas: HashMap::new(),
            class_to_class_delta: Array2::zeros((num_classes, num_classes)),
            class_hubness_delta: vec![0; num_classes],
        }
    }

    pub fn left_out(&self) -> Option<usize> {
        self.left_out
    }

    /// Whether any delta is currently applied.
    pub fn is_patched(&self) -> bool {
        self.left_out.is_some()
    }

    /// Removes `point`'s influence. A previous patch is restored first.
    pub fn patch(&mut self, point: usize) {
        if self.is_patched() {
            self.restore();
        }
        self.left_out = Some(point);

        let k = self.counts.k();
        let graph = self.graph;
        let own_label = self.labels[point];
        for &nb in graph.neighbors(point).iter().take(k) {
            self.shift(own_label, nb, -1);
        }

        let counts = self.counts;
        for &j in counts.reverse_neighbors(point) {
            self.shift(self.labels[j], point, -1);
            if let Some(&buffer) = graph.neighbors(j).get(k) {
                self.shift(self.labels[j], buffer, 1);
            }
        }
    }

    /// Drops every delta; the view reads the snapshot again.
    pub fn restore(&mut self) {
        self.left_out = None;
        self.point_deltas.clear();
        self.class_to_class_delta.fill(0);
        self.class_hubness_delta.fill(0);
    }

    /// Records `delta` occurrences of `neighbor` in the neighborhood of a
    /// point of class `query_class`.
    fn shift(&mut self, query_class: usize, neighbor: usize, delta: i64) {
        let num_classes = self.counts.num_classes();
        let entry = self
            .point_deltas
            .entry(neighbor)
            .or_insert_with(|| PointDelta {
                occurrence: 0,
                by_class: vec![0; num_classes],
            });
        entry.occurrence += delta;
        entry.by_class[query_class] += delta;

        let neighbor_class = self.labels[neighbor];
        self.class_to_class_delta[[neighbor_class, query_class]] += delta;
        self.class_hubness_delta[neighbor_class] += delta;
    }

    fn class_count(&self, class: usize, point: usize) -> f64 {
        let delta = self
            .point_deltas
            .get(&point)
            .map_or(0, |d| d.by_class[class]);
        (self.counts.class_count(class, point) as i64 + delta).max(0) as f64
    }
}

impl OccurrenceModel for LeaveOneOut<'_> {
    fn num_classes(&self) -> usize {
        self.counts.num_classes()
    }

    fn num_points(&self) -> usize {
        self.counts.len()
    }

    fn label(&self, point: usize) -> usize {
        self.labels[point]
    }

    fn occurrence(&self, point: usize) -> u32 {
        let delta = self.point_deltas.get(&point).map_or(0, |d| d.occurrence);
        (self.counts.occurrence(point) as i64 + delta).max(0) as u32
    }

    fn max_occurrence(&self) -> u32 {
        self.counts.max_occurrence()
    }

    fn occurrence_profile(&self, point: usize, out: &mut [f64]) {
        let num_classes = self.num_classes();
        let occurrence = self.occurrence(point) as f64;
        for (c, o) in out.iter_mut().enumerate() {
            *o = smoothed_relation(self.class_count(c, point), occurrence, num_classes, self.laplace);
        }
    }

    fn anti_hub_profile(&self, scheme: AntiHubScheme, point: usize, out: &mut [f64]) {
        let own_label = self.labels[point];
        match scheme {
            AntiHubScheme::Global => {
                let num_classes = self.num_classes();
                let hubness = (self.counts.class_hubness(own_label) as i64
                    + self.class_hubness_delta[own_label])
                    .max(0) as f64;
                for (c, o) in out.iter_mut().enumerate() {
                    let count = (self.counts.class_to_class(own_label, c) as i64
                        + self.class_to_class_delta[[own_label, c]])
                        .max(0) as f64;
                    *o = smoothed_prior(count, hubness, num_classes, self.laplace);
                }
            }
            AntiHubScheme::Local | AntiHubScheme::LocalFuzzy => {
                let left_out = self.left_out;
                let neighbor_labels = self
                    .graph
                    .neighbors(point)
                    .iter()
                    .take(self.local_size)
                    .filter(|&&j| Some(j) != left_out)
                    .map(|&j| self.labels[j]);
                fill_local(out, own_label, neighbor_labels, self.laplace);
                if scheme == AntiHubScheme::LocalFuzzy {
                    fuzzify(out, own_label);
                }
            }
            AntiHubScheme::Label => fill_label(out, own_label, self.laplace),
        }
    }
}
