//! Fallback class distributions for anti-hub neighbors.
//!
//! A point that rarely occurs in other points' neighborhoods has an
//! occurrence profile built from almost no evidence. Instead of that profile
//! the vote uses one of these estimates, all Laplace smoothed:
//!
//! - LOCAL: class histogram over the point's own local neighborhood (at least
//!   [`LOCAL_NEIGHBORHOOD`] neighbors), counting the point's label once.
//! - LOCALF: LOCAL squeezed into `[0.49·x, 0.51 + 0.49·x]`, favoring the
//!   point's own label.
//! - LABEL: a crisp distribution from the label alone.
//!
//! The GLOBAL scheme reads the class-to-class priors and lives with the
//! occurrence tables.

use super::config::AntiHubScheme;

/// Minimum size of the neighborhood the local estimates are built from.
pub const LOCAL_NEIGHBORHOOD: usize = 10;

const FUZZY_OWN_CLASS: f64 = 0.51;
const FUZZY_SCALE: f64 = 0.49;

/// Size of the local neighborhood for a model trained at `k` over `n` points.
pub fn local_size(k: usize, n: usize) -> usize {
    k.max(LOCAL_NEIGHBORHOOD).min(n.saturating_sub(1))
}

/// Smoothed class histogram of `neighbor_labels` plus the point's own label:
/// `(count_c + [own == c] + λ) / (size + 1 + C·λ)`.
pub fn fill_local<I>(out: &mut [f64], own_label: usize, neighbor_labels: I, laplace: f64)
where
    I: IntoIterator<Item = usize>,
{
    out.fill(0.0);
    out[own_label] = 1.0;
    let mut size = 0usize;
    for label in neighbor_labels {
        out[label] += 1.0;
        size += 1;
    }
    let denominator = size as f64 + 1.0 + out.len() as f64 * laplace;
    for p in out.iter_mut() {
        *p = (*p + laplace) / denominator;
    }
}

/// Turns a distribution into its label-biased fuzzy version in place:
/// `0.51 + 0.49·x` for the own class and `0.49·x` for the others.
pub fn fuzzify(out: &mut [f64], own_label: usize) {
    for (c, p) in out.iter_mut().enumerate() {
        *p *= FUZZY_SCALE;
        if c == own_label {
            *p += FUZZY_OWN_CLASS;
        }
    }
}

/// `(1 + λ) / (1 + C·λ)` for the own class and `λ / (1 + C·λ)` otherwise.
pub fn fill_label(out: &mut [f64], own_label: usize, laplace: f64) {
    let denominator = 1.0 + out.len() as f64 * laplace;
    out.fill(laplace / denominator);
    out[own_label] = (1.0 + laplace) / denominator;
}

/// The three local fallbacks stored for one anti-hub point.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDistributions {
    pub local: Vec<f64>,
    pub fuzzy: Vec<f64>,
    pub label: Vec<f64>,
}

impl LocalDistributions {
    pub fn compute(
        own_label: usize,
        neighbor_labels: &[usize],
        num_classes: usize,
        laplace: f64,
    ) -> Self {
        let mut local = vec![0.0; num_classes];
        fill_local(&mut local, own_label, neighbor_labels.iter().copied(), laplace);
        let mut fuzzy = local.clone();
        fuzzify(&mut fuzzy, own_label);
        let mut label = vec![0.0; num_classes];
        fill_label(&mut label, own_label, laplace);
        Self {
            local,
            fuzzy,
            label,
        }
    }

    /// The stored distribution for `scheme`; `None` for GLOBAL.
    pub fn get(&self, scheme: AntiHubScheme) -> Option<&[f64]> {
        match scheme {
            AntiHubScheme::Global => None,
            AntiHubScheme::Local => Some(&self.local),
            AntiHubScheme::LocalFuzzy => Some(&self.fuzzy),
            AntiHubScheme::Label => Some(&self.label),
        }
    }
}
