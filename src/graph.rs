//! The k-nearest-neighbor graph over a training set.
//!
//! [`NeighborGraph`] stores, for every training point, its nearest neighbors
//! (self excluded) sorted by ascending distance. Occurrence statistics and
//! reverse-neighbor lists can be derived for any `k` up to the stored size
//! without running the search again.
//!
//! The search is brute force: O(N²) distance evaluations, spread over the
//! rayon pool one row at a time.

pub mod knn_buffer;

pub use knn_buffer::{nearest_neighbors, KnnBuffer};

use crate::data::TrainingSet;
use crate::error::{Error, Result};
use crate::metric::Metric;
use log::debug;
use rayon::prelude::*;

/// Per-point occurrence counts at one neighborhood size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceStats {
    /// Times each point appears in some other point's k-neighborhood.
    pub occurrence: Vec<u32>,
    /// Occurrences in the neighborhood of a point with the same label.
    pub good: Vec<u32>,
    /// Occurrences in the neighborhood of a point with a different label.
    pub bad: Vec<u32>,
}

/// Sorted nearest-neighbor lists of every training point.
#[derive(Debug, Clone)]
pub struct NeighborGraph {
    k: usize,
    neighbors: Vec<Vec<usize>>,
    distances: Vec<Vec<f64>>,
    tabu: Vec<bool>,
}

impl NeighborGraph {
    /// Computes the `k` nearest neighbors of every training point.
    ///
    /// # Errors
    ///
    /// - `UninitializedModel` for an empty training set.
    /// - `InvalidParameter` for `k == 0`.
    /// - `OutOfRange` if `k` exceeds `N - 1`.
    pub fn compute<M: Metric>(data: &TrainingSet, metric: &M, k: usize) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::UninitializedModel(
                "cannot build a neighbor graph without data".to_string(),
            ));
        }
        if k == 0 {
            return Err(Error::invalid("k", "neighborhood size must be positive"));
        }
        let n = data.len();
        if k > n - 1 {
            return Err(Error::OutOfRange {
                what: "k",
                value: k,
                limit: n - 1,
            });
        }

        debug!("computing {}-NN graph over {} points", k, n);
        let rows: Vec<(Vec<usize>, Vec<f64>)> = (0..n)
            .into_par_iter()
            .map(|i| nearest_neighbors(data, metric, data.point(i), k, |j| j == i))
            .collect();
        let (neighbors, distances) = rows.into_iter().unzip();

        Ok(Self {
            k,
            neighbors,
            distances,
            tabu: vec![false; n],
        })
    }

    /// Number of neighbors stored per point.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Neighbors of `point`, nearest first.
    pub fn neighbors(&self, point: usize) -> &[usize] {
        &self.neighbors[point]
    }

    /// Distances matching [`NeighborGraph::neighbors`].
    pub fn distances(&self, point: usize) -> &[f64] {
        &self.distances[point]
    }

    pub fn is_tabu(&self, point: usize) -> bool {
        self.tabu[point]
    }

    fn check_k(&self, k: usize) -> Result<()> {
        if k > self.k {
            return Err(Error::OutOfRange {
                what: "k",
                value: k,
                limit: self.k,
            });
        }
        Ok(())
    }

    /// Occurrence statistics for the first `k` neighbors of every point.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `k` exceeds the stored neighborhood size.
    pub fn stats_for_k(&self, k: usize, labels: &[usize]) -> Result<OccurrenceStats> {
        self.check_k(k)?;
        let n = self.len();
        let mut stats = OccurrenceStats {
            occurrence: vec![0; n],
            good: vec![0; n],
            bad: vec![0; n],
        };
        for (i, row) in self.neighbors.iter().enumerate() {
            for &nb in row.iter().take(k) {
                stats.occurrence[nb] += 1;
                if labels[nb] == labels[i] {
                    stats.good[nb] += 1;
                } else {
                    stats.bad[nb] += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Reverse-neighbor lists at size `k`: entry `i` holds every `j` that has
    /// `i` among its first `k` neighbors, in ascending order.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `k` exceeds the stored neighborhood size.
    pub fn reverse_neighbors(&self, k: usize) -> Result<Vec<Vec<usize>>> {
        self.check_k(k)?;
        let mut reverse = vec![Vec::new(); self.len()];
        for (j, row) in self.neighbors.iter().enumerate() {
            for &nb in row.iter().take(k) {
                reverse[nb].push(j);
            }
        }
        Ok(reverse)
    }

    /// Reverse neighbors of a single point at size `k`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `point` is not a training index or `k` exceeds the
    /// stored neighborhood size.
    pub fn reverse_neighbors_of(&self, point: usize, k: usize) -> Result<Vec<usize>> {
        self.check_k(k)?;
        if point >= self.len() {
            return Err(Error::OutOfRange {
                what: "point",
                value: point,
                limit: self.len(),
            });
        }
        Ok(self
            .neighbors
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().take(k).any(|&nb| nb == point))
            .map(|(j, _)| j)
            .collect())
    }

    /// The `size` nearest neighbors of `point`. When the graph stores fewer,
    /// the list is extended by scanning the training set for the nearest
    /// points not already known, for this point only.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `point` is not a training index.
    pub fn extended_neighbors<M: Metric>(
        &self,
        data: &TrainingSet,
        metric: &M,
        point: usize,
        size: usize,
    ) -> Result<Vec<usize>> {
        if point >= self.len() {
            return Err(Error::OutOfRange {
                what: "point",
                value: point,
                limit: self.len(),
            });
        }
        let known = &self.neighbors[point];
        if size <= known.len() {
            return Ok(known[..size].to_vec());
        }

        let (extra, _) = nearest_neighbors(
            data,
            metric,
            data.point(point),
            size - known.len(),
            |j| j == point || self.tabu[j] || known.contains(&j),
        );
        let mut extended = known.clone();
        extended.extend(extra);
        Ok(extended)
    }

    /// Removes `point` from consideration as a neighbor. Every list that held
    /// it gets the nearest remaining non-tabu point spliced in at its sorted
    /// position. If no candidate is left, the list shrinks by one.
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `point` is not a training index.
    pub fn tabu<M: Metric>(&mut self, data: &TrainingSet, metric: &M, point: usize) -> Result<()> {
        if point >= self.len() {
            return Err(Error::OutOfRange {
                what: "point",
                value: point,
                limit: self.len(),
            });
        }
        if self.tabu[point] {
            return Ok(());
        }
        self.tabu[point] = true;

        for j in 0..self.len() {
            let Some(pos) = self.neighbors[j].iter().position(|&nb| nb == point) else {
                continue;
            };
            self.neighbors[j].remove(pos);
            self.distances[j].remove(pos);

            let row = &self.neighbors[j];
            let tabu = &self.tabu;
            let (replacement, dist) =
                nearest_neighbors(data, metric, data.point(j), 1, |c| {
                    c == j || tabu[c] || row.contains(&c)
                });
            if let (Some(&r), Some(&d)) = (replacement.first(), dist.first()) {
                let at = self.distances[j].partition_point(|&x| x <= d);
                self.neighbors[j].insert(at, r);
                self.distances[j].insert(at, d);
            }
        }
        debug!("point {} marked tabu", point);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Euclidean;

    fn line() -> TrainingSet {
        TrainingSet::new(
            vec![
                vec![0.0],
                vec![1.0],
                vec![2.0],
                vec![10.0],
                vec![11.0],
                vec![12.0],
            ],
            vec![0, 0, 0, 1, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_compute_excludes_self_and_sorts() {
        let graph = NeighborGraph::compute(&line(), &Euclidean, 3).unwrap();
        assert_eq!(graph.neighbors(0), &[1, 2, 3]);
        assert_eq!(graph.neighbors(1), &[0, 2, 3]);
        // 10.0 and 12.0 are both at distance 1 from 11.0; the lower index wins.
        assert_eq!(graph.neighbors(4), &[3, 5, 2]);
        for i in 0..graph.len() {
            assert!(!graph.neighbors(i).contains(&i));
            assert!(graph.distances(i).windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_compute_rejects_bad_k() {
        let data = line();
        assert!(matches!(
            NeighborGraph::compute(&data, &Euclidean, 0),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            NeighborGraph::compute(&data, &Euclidean, 6),
            Err(Error::OutOfRange { value: 6, limit: 5, .. })
        ));
        let empty = TrainingSet::new(vec![], vec![]).unwrap();
        assert!(matches!(
            NeighborGraph::compute(&empty, &Euclidean, 1),
            Err(Error::UninitializedModel(_))
        ));
    }

    #[test]
    fn test_stats_for_k() {
        let data = line();
        let graph = NeighborGraph::compute(&data, &Euclidean, 3).unwrap();
        let stats = graph.stats_for_k(3, data.labels()).unwrap();
        assert_eq!(stats.occurrence, vec![2, 2, 5, 5, 2, 2]);
        assert_eq!(stats.occurrence.iter().sum::<u32>(), 18);
        assert_eq!(stats.bad[2], 3);
        assert_eq!(stats.good[2], 2);
        assert_eq!(stats.bad[3], 3);

        let smaller = graph.stats_for_k(1, data.labels()).unwrap();
        assert_eq!(smaller.occurrence.iter().sum::<u32>(), 6);
        assert!(graph.stats_for_k(4, data.labels()).is_err());
    }

    #[test]
    fn test_reverse_neighbors_consistent() {
        let data = line();
        let graph = NeighborGraph::compute(&data, &Euclidean, 3).unwrap();
        let stats = graph.stats_for_k(2, data.labels()).unwrap();
        let reverse = graph.reverse_neighbors(2).unwrap();
        for (i, list) in reverse.iter().enumerate() {
            assert_eq!(list.len() as u32, stats.occurrence[i]);
            for &j in list {
                assert!(graph.neighbors(j)[..2].contains(&i));
            }
            assert_eq!(list, &graph.reverse_neighbors_of(i, 2).unwrap());
        }
    }

    #[test]
    fn test_extended_neighbors() {
        let data = line();
        let graph = NeighborGraph::compute(&data, &Euclidean, 2).unwrap();
        assert_eq!(graph.extended_neighbors(&data, &Euclidean, 0, 1).unwrap(), vec![1]);
        assert_eq!(
            graph.extended_neighbors(&data, &Euclidean, 0, 5).unwrap(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(matches!(
            graph.extended_neighbors(&data, &Euclidean, 9, 4),
            Err(Error::OutOfRange { what: "point", value: 9, limit: 6 })
        ));
    }

    #[test]
    fn test_tabu_splices_replacement() {
        let data = line();
        let mut graph = NeighborGraph::compute(&data, &Euclidean, 2).unwrap();
        graph.tabu(&data, &Euclidean, 1).unwrap();
        assert!(graph.is_tabu(1));
        assert_eq!(graph.neighbors(0), &[2, 3]);
        assert_eq!(graph.neighbors(2), &[0, 3]);
        for i in 0..graph.len() {
            assert!(!graph.neighbors(i).contains(&1));
            assert!(graph.distances(i).windows(2).all(|w| w[0] <= w[1]));
        }
        assert!(graph.tabu(&data, &Euclidean, 42).is_err());
    }

    #[test]
    fn test_tabu_shrinks_lists_when_candidates_run_out() {
        let data = TrainingSet::new(vec![vec![0.0], vec![1.0], vec![3.0]], vec![0, 0, 1]).unwrap();
        let mut graph = NeighborGraph::compute(&data, &Euclidean, 2).unwrap();
        graph.tabu(&data, &Euclidean, 1).unwrap();
        assert_eq!(graph.neighbors(0), &[2]);
        assert_eq!(graph.neighbors(2), &[0]);
        assert_eq!(graph.distances(0), &[3.0]);

        graph.tabu(&data, &Euclidean, 2).unwrap();
        assert!(graph.neighbors(0).is_empty());
        assert!(graph.distances(0).is_empty());
    }
}
