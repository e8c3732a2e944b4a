use crate::data::TrainingSet;
use crate::metric::Metric;

/// A bounded, distance-sorted neighbor list maintained by insertion.
///
/// Candidates are offered one at a time. A candidate whose distance equals an
/// entry already present goes after it, so ties keep the order in which the
/// candidates were offered.
#[derive(Debug, Clone)]
pub struct KnnBuffer {
    capacity: usize,
    indices: Vec<usize>,
    distances: Vec<f64>,
}

impl KnnBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            indices: Vec::with_capacity(capacity + 1),
            distances: Vec::with_capacity(capacity + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.indices.len() >= self.capacity
    }

    /// Offer a candidate. Returns `true` if it was kept.
    pub fn offer(&mut self, index: usize, distance: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.is_full() {
            match self.distances.last() {
                Some(&worst) if distance < worst => {}
                _ => return false,
            }
            self.indices.pop();
            self.distances.pop();
        }

        let mut pos = self.distances.len();
        while pos > 0 && self.distances[pos - 1] > distance {
            pos -= 1;
        }
        self.indices.insert(pos, index);
        self.distances.insert(pos, distance);
        true
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<f64>) {
        (self.indices, self.distances)
    }
}

/// Online k-nearest-neighbor scan over the training set.
///
/// Points for which `skip` returns `true` are never considered. Returns the
/// neighbor indices and distances, nearest first.
pub fn nearest_neighbors<M, F>(
    data: &TrainingSet,
    metric: &M,
    query: &[f64],
    k: usize,
    skip: F,
) -> (Vec<usize>, Vec<f64>)
where
    M: Metric,
    F: Fn(usize) -> bool,
{
    let mut buffer = KnnBuffer::new(k);
    for (j, point) in data.features().iter().enumerate() {
        if skip(j) {
            continue;
        }
        buffer.offer(j, metric.distance(query, point));
    }
    buffer.into_parts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Euclidean;

    #[test]
    fn test_keeps_k_smallest_sorted() {
        let mut buffer = KnnBuffer::new(3);
        for (i, d) in [5.0, 1.0, 4.0, 2.0, 3.0].iter().enumerate() {
            buffer.offer(i, *d);
        }
        assert_eq!(buffer.indices(), &[1, 3, 4]);
        assert_eq!(buffer.distances(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut buffer = KnnBuffer::new(3);
        assert!(buffer.offer(7, 1.0));
        assert!(buffer.offer(2, 1.0));
        assert!(buffer.offer(9, 0.5));
        // A full buffer rejects a candidate tied with its worst entry.
        assert!(!buffer.offer(0, 1.0));
        assert_eq!(buffer.indices(), &[9, 7, 2]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut buffer = KnnBuffer::new(0);
        assert!(!buffer.offer(0, 0.0));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_nearest_neighbors_skips() {
        let data = TrainingSet::new(
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            vec![0, 0, 1, 1],
        )
        .unwrap();
        let (idx, dist) = nearest_neighbors(&data, &Euclidean, &[0.9], 2, |j| j == 1);
        assert_eq!(idx, vec![0, 2]);
        assert!((dist[0] - 0.9).abs() < 1e-12);
        assert!((dist[1] - 1.1).abs() < 1e-12);
    }
}
