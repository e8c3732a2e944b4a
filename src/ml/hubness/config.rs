use crate::error::{Error, Result};
use crate::ml::classifier::NeighborhoodSize;
use std::fmt;

/// Default additive smoothing constant for occurrence counts.
pub const DEFAULT_LAPLACE_ESTIMATOR: f64 = 0.001;

/// Default Minkowski-style exponent `m` of the inverse-distance weighting.
pub const DEFAULT_DISTANCE_EXPONENT: f64 = 2.0;

/// Where an anti-hub neighbor's vote comes from when its own occurrence
/// profile is too sparse to trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AntiHubScheme {
    /// Class-to-class prior of the neighbor's label.
    #[default]
    Global,
    /// Smoothed class histogram of the neighbor's local neighborhood.
    Local,
    /// The local histogram biased toward the neighbor's own label.
    LocalFuzzy,
    /// A crisp distribution driven by the neighbor's label alone.
    Label,
}

impl AntiHubScheme {
    pub const ALL: [AntiHubScheme; 4] = [
        AntiHubScheme::Global,
        AntiHubScheme::Local,
        AntiHubScheme::LocalFuzzy,
        AntiHubScheme::Label,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AntiHubScheme::Global => "GLOBAL",
            AntiHubScheme::Local => "LOCAL",
            AntiHubScheme::LocalFuzzy => "LOCALF",
            AntiHubScheme::Label => "LABEL",
        }
    }
}

impl fmt::Display for AntiHubScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration of a hubness-aware fuzzy classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct HubnessConfig {
    /// Fixed neighborhood size, or the range to search.
    pub k: NeighborhoodSize,
    /// Laplace estimator λ added to every occurrence count.
    pub laplace_estimator: f64,
    /// Exponent `m` of the weighting `1 / d^(2/(m-1))`. Must exceed 1.
    pub distance_exponent: f64,
    /// Neighbors occurring at most this often are treated as anti-hubs.
    pub anti_hub_cutoff: u32,
    /// Fallback vote source for anti-hubs.
    pub scheme: AntiHubScheme,
    /// Seed for the random tie-breaks during leave-one-out search.
    pub seed: u64,
}

impl Default for HubnessConfig {
    fn default() -> Self {
        Self {
            k: NeighborhoodSize::default(),
            laplace_estimator: DEFAULT_LAPLACE_ESTIMATOR,
            distance_exponent: DEFAULT_DISTANCE_EXPONENT,
            anti_hub_cutoff: 0,
            scheme: AntiHubScheme::default(),
            seed: 0,
        }
    }
}

impl HubnessConfig {
    pub fn new(k: NeighborhoodSize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_laplace_estimator(mut self, laplace_estimator: f64) -> Self {
        self.laplace_estimator = laplace_estimator;
        self
    }

    pub fn with_distance_exponent(mut self, distance_exponent: f64) -> Self {
        self.distance_exponent = distance_exponent;
        self
    }

    pub fn with_anti_hub_cutoff(mut self, anti_hub_cutoff: u32) -> Self {
        self.anti_hub_cutoff = anti_hub_cutoff;
        self
    }

    pub fn with_scheme(mut self, scheme: AntiHubScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks the numeric settings. The neighborhood size is checked against
    /// the training set separately.
    pub fn validate(&self) -> Result<()> {
        validate_laplace(self.laplace_estimator)?;
        validate_exponent(self.distance_exponent)
    }
}

pub(crate) fn validate_laplace(laplace: f64) -> Result<()> {
    if !laplace.is_finite() || laplace < 0.0 {
        return Err(Error::invalid(
            "laplace_estimator",
            format!("{laplace} is not a finite non-negative number"),
        ));
    }
    Ok(())
}

/// Rejects exponents at or below 1, where `2/(m-1)` divides by zero or turns
/// the weighting upside down.
pub fn validate_exponent(exponent: f64) -> Result<()> {
    if !exponent.is_finite() || exponent <= 1.0 {
        return Err(Error::invalid(
            "distance_exponent",
            format!("{exponent} must be a finite number greater than 1"),
        ));
    }
    Ok(())
}

/// The hyperparameters a trained model runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HyperparameterChoice {
    pub k: usize,
    pub anti_hub_cutoff: u32,
    pub scheme: AntiHubScheme,
    pub distance_exponent: f64,
    /// Leave-one-out accuracy, when the choice came out of a search.
    pub accuracy: Option<f64>,
}

impl HyperparameterChoice {
    /// The choice implied by a configuration with a fixed `k`.
    pub fn fixed(config: &HubnessConfig, k: usize) -> Self {
        Self {
            k,
            anti_hub_cutoff: config.anti_hub_cutoff,
            scheme: config.scheme,
            distance_exponent: config.distance_exponent,
            accuracy: None,
        }
    }
}

impl fmt::Display for HyperparameterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "k={} theta={} scheme={} m={:.1}",
            self.k, self.anti_hub_cutoff, self.scheme, self.distance_exponent
        )?;
        if let Some(acc) = self.accuracy {
            write!(f, " accuracy={acc:.4}")?;
        }
        Ok(())
    }
}
