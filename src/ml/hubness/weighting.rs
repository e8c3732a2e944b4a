//! Per-neighbor weighting plug-ins for the hubness-aware vote.
//!
//! The family members differ only in how much each neighbor's fuzzy vote
//! counts:
//!
//! - [`Uniform`]: every neighbor weighs `1/k` (h-FNN).
//! - [`InverseDistance`]: `1 / d^(2/(m-1))`, normalized (dwh-FNN).
//! - [`Informative`]: inverse distance, scaled by how much information the
//!   neighbor's occurrence carries, and with a label-trust interpolation
//!   between its label and its occurrence profile (HIKNN).

use log::trace;
use std::fmt::Debug;

use super::config::AntiHubScheme;

/// Weight given to a neighbor that coincides with the query.
pub const ZERO_DISTANCE_WEIGHT: f64 = 10000.0;

/// Raw inverse-distance weight `1 / d^(2/(m-1))`, or
/// [`ZERO_DISTANCE_WEIGHT`] for `d == 0`. `exponent` must exceed 1.
pub fn distance_weight(distance: f64, exponent: f64) -> f64 {
    if distance == 0.0 {
        ZERO_DISTANCE_WEIGHT
    } else {
        1.0 / distance.powf(2.0 / (exponent - 1.0))
    }
}

/// Inverse-distance weights normalized to sum to one.
///
/// If some weights overflow, the infinite ones share the mass equally. If
/// all of them underflow, `out` stays all zero and the caller falls back to
/// the class priors.
pub fn inverse_distance_weights(distances: &[f64], exponent: f64, out: &mut Vec<f64>) {
    out.clear();
    out.extend(distances.iter().map(|&d| distance_weight(d, exponent)));

    let sum: f64 = out.iter().sum();
    if sum.is_finite() && sum > 0.0 {
        for w in out.iter_mut() {
            *w /= sum;
        }
        return;
    }

    let infinite = out.iter().filter(|w| w.is_infinite()).count();
    if infinite > 0 {
        trace!("{} neighbor weights overflowed", infinite);
        for w in out.iter_mut() {
            *w = if w.is_infinite() {
                1.0 / infinite as f64
            } else {
                0.0
            };
        }
    } else {
        trace!("neighbor weights underflowed to zero");
        out.fill(0.0);
    }
}

/// What a weighting may know about one neighbor of the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborContext {
    pub label: usize,
    pub occurrence: u32,
    pub max_occurrence: u32,
    pub num_points: usize,
}

/// The part of the vote that differs between family members.
pub trait VoteWeighting: Debug + Clone + Default + Send + Sync {
    /// Whether the distance exponent affects the weights.
    fn uses_distance(&self) -> bool;

    /// Whether an automatic search tunes the anti-hub cutoff and scheme.
    fn searches_anti_hubs(&self) -> bool {
        true
    }

    /// Whether an automatic search tunes the distance exponent.
    fn searches_exponent(&self) -> bool {
        self.uses_distance()
    }

    /// Scheme a freshly constructed classifier starts with.
    fn default_scheme(&self) -> AntiHubScheme {
        AntiHubScheme::Global
    }

    /// Weights of the query's neighbors, summing to one unless they all
    /// underflow.
    fn neighbor_weights(&self, distances: &[f64], exponent: f64, out: &mut Vec<f64>) {
        if self.uses_distance() {
            inverse_distance_weights(distances, exponent, out);
        } else {
            out.clear();
            if !distances.is_empty() {
                out.resize(distances.len(), 1.0 / distances.len() as f64);
            }
        }
    }

    /// Reshapes the neighbor's fuzzy vote in place and returns a factor
    /// multiplying its weight.
    fn adjust_vote(&self, _neighbor: &NeighborContext, _profile: &mut [f64]) -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl VoteWeighting for Uniform {
    fn uses_distance(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InverseDistance;

impl VoteWeighting for InverseDistance {
    fn uses_distance(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Informative;

/// Label trust `α` and relevance `β` of a neighbor, both in `[0, 1]`.
///
/// With `IC = log2(N / (occ + 1))`, `α` rescales IC between the least
/// informative point in the set (the biggest hub) and a point that never
/// occurs; `β = IC / log2(N)`.
pub fn information_factors(neighbor: &NeighborContext) -> (f64, f64) {
    let n = neighbor.num_points as f64;
    let max_ic = n.log2().max(0.0);
    let ic = (n / (neighbor.occurrence as f64 + 1.0)).log2().max(0.0);
    let min_ic = (n / (neighbor.max_occurrence as f64 + 1.0)).log2().max(0.0);

    let alpha = if max_ic - min_ic > f64::EPSILON {
        ((ic - min_ic) / (max_ic - min_ic)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let beta = if max_ic > 0.0 {
        (ic / max_ic).clamp(0.0, 1.0)
    } else {
        1.0
    };
    (alpha, beta)
}

impl VoteWeighting for Informative {
    fn uses_distance(&self) -> bool {
        true
    }

    fn searches_anti_hubs(&self) -> bool {
        false
    }

    fn searches_exponent(&self) -> bool {
        false
    }

    fn default_scheme(&self) -> AntiHubScheme {
        AntiHubScheme::Label
    }

    fn adjust_vote(&self, neighbor: &NeighborContext, profile: &mut [f64]) -> f64 {
        let (alpha, beta) = information_factors(neighbor);
        for (c, p) in profile.iter_mut().enumerate() {
            let crisp = if c == neighbor.label { 1.0 } else { 0.0 };
            *p = alpha * crisp + (1.0 - alpha) * *p;
        }
        beta
    }
}
