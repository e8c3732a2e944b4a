use super::config::{AntiHubScheme, HyperparameterChoice};
use super::occurrence::OccurrenceModel;
use super::weighting::{NeighborContext, VoteWeighting};
use log::trace;

/// Turns a query's neighbors into class probabilities.
///
/// Each neighbor contributes a fuzzy class distribution scaled by its
/// weight: its class-occurrence profile when it occurs more than
/// `anti_hub_cutoff` times, and the fallback of the selected
/// [`AntiHubScheme`] otherwise. The estimator holds no tables of its own, so
/// the same instance serves trained models and leave-one-out views.
#[derive(Debug, Clone)]
pub struct VoteEstimator<W: VoteWeighting> {
    weighting: W,
    anti_hub_cutoff: u32,
    scheme: AntiHubScheme,
    distance_exponent: f64,
}

impl<W: VoteWeighting> VoteEstimator<W> {
    pub fn new(
        weighting: W,
        anti_hub_cutoff: u32,
        scheme: AntiHubScheme,
        distance_exponent: f64,
    ) -> Self {
        Self {
            weighting,
            anti_hub_cutoff,
            scheme,
            distance_exponent,
        }
    }

    pub fn from_choice(weighting: W, choice: &HyperparameterChoice) -> Self {
        Self::new(
            weighting,
            choice.anti_hub_cutoff,
            choice.scheme,
            choice.distance_exponent,
        )
    }

    pub fn scheme(&self) -> AntiHubScheme {
        self.scheme
    }

    pub fn anti_hub_cutoff(&self) -> u32 {
        self.anti_hub_cutoff
    }

    /// Class probabilities for a query with the given neighbors, nearest
    /// first. Returns `priors` unchanged when the vote carries no mass.
    pub fn estimate<O: OccurrenceModel>(
        &self,
        model: &O,
        neighbors: &[usize],
        distances: &[f64],
        priors: &[f64],
    ) -> Vec<f64> {
        let num_classes = model.num_classes();
        let mut weights = Vec::with_capacity(neighbors.len());
        self.weighting
            .neighbor_weights(distances, self.distance_exponent, &mut weights);

        let mut votes = vec![0.0; num_classes];
        let mut profile = vec![0.0; num_classes];
        for (&nb, &weight) in neighbors.iter().zip(weights.iter()) {
            let occurrence = model.occurrence(nb);
            if occurrence > self.anti_hub_cutoff {
                model.occurrence_profile(nb, &mut profile);
            } else {
                model.anti_hub_profile(self.scheme, nb, &mut profile);
            }

            let context = NeighborContext {
                label: model.label(nb),
                occurrence,
                max_occurrence: model.max_occurrence(),
                num_points: model.num_points(),
            };
            let scale = weight * self.weighting.adjust_vote(&context, &mut profile);
            if scale == 0.0 {
                continue;
            }
            for (v, &p) in votes.iter_mut().zip(profile.iter()) {
                *v += scale * p;
            }
        }

        let total: f64 = votes.iter().sum();
        if total > 0.0 && total.is_finite() {
            for v in votes.iter_mut() {
                *v /= total;
            }
            votes
        } else {
            trace!("vote mass is {}, falling back to class priors", total);
            priors.to_vec()
        }
    }
}
