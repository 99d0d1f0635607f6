//! Run configuration for the SSVS sampler.
//!
//! Every knob of the sampler lives here with a documented default, and
//! [`SsvsOptions::validate`] is called by the entry points before any
//! sampling begins, so a misconfigured run fails before any work is done.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spike-and-slab prior hyperparameters.
///
/// The slab component represents a plausible nonzero effect; the spike
/// component concentrates excluded coefficients near (but never exactly at)
/// zero. The soft spike is load-bearing: excluded predictors keep
/// contributing their small draws to the linear predictor and to the
/// all-draws coefficient mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorSpec {
    /// Prior probability that a predictor is included. Default 0.5, giving
    /// even prior odds.
    pub inclusion_prob: f64,
    /// Prior variance of an included coefficient. Default 10.0.
    pub slab_variance: f64,
    /// Prior variance of an excluded coefficient. Default 0.01.
    pub spike_variance: f64,
    /// Prior variance of the intercept, which is always in the model.
    /// Default 1000.0 (effectively flat).
    pub intercept_variance: f64,
    /// Shape of the inverse-gamma prior on the residual variance.
    /// Default 0.01.
    pub variance_shape: f64,
    /// Scale of the inverse-gamma prior on the residual variance.
    /// Default 0.01.
    pub variance_scale: f64,
}

impl Default for PriorSpec {
    fn default() -> Self {
        Self {
            inclusion_prob: 0.5,
            slab_variance: 10.0,
            spike_variance: 0.01,
            intercept_variance: 1000.0,
            variance_shape: 0.01,
            variance_scale: 0.01,
        }
    }
}

/// Options for a full SSVS run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsvsOptions {
    /// Total Gibbs sweeps per chain, including burn-in. Default 20_000.
    pub iterations: usize,
    /// Sweeps discarded from the front of every chain. `None` uses
    /// `iterations / 4`.
    pub burn_in: Option<usize>,
    /// Independent chains per dataset slice. Default 1.
    pub replications: usize,
    /// Number of imputed datasets. Must be 1 for single-dataset runs.
    pub imputations: usize,
    /// Credible-interval level in (0, 1). Default 0.95.
    pub interval: f64,
    /// Whether the response is continuous. `false` selects the probit
    /// augmentation path with the residual variance fixed at 1.
    pub continuous: bool,
    /// Show a progress bar over slices. Purely an observer: it never alters
    /// sampler state or the draw sequence.
    pub progress: bool,
    /// Base seed. Per-slice RNG streams are derived deterministically from
    /// this and the slice indices, so results are reproducible regardless of
    /// thread scheduling.
    pub seed: u64,
    /// Prior hyperparameters.
    pub prior: PriorSpec,
}

impl Default for SsvsOptions {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            burn_in: None,
            replications: 1,
            imputations: 1,
            interval: 0.95,
            continuous: true,
            progress: false,
            seed: 0,
            prior: PriorSpec::default(),
        }
    }
}

impl SsvsOptions {
    /// The number of sweeps discarded before draws are retained.
    pub fn burn_in_count(&self) -> usize {
        self.burn_in.unwrap_or(self.iterations / 4)
    }

    /// The number of retained draws per chain.
    pub fn retained(&self) -> usize {
        self.iterations.saturating_sub(self.burn_in_count())
    }

    /// Checks every knob before sampling. A run that would retain zero
    /// draws, or sample from an improper prior, is rejected here rather
    /// than producing undefined statistics downstream.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::NonPositiveIterations);
        }
        let burn = self.burn_in_count();
        if self.iterations <= burn {
            return Err(ConfigError::BurnInExhaustsIterations {
                iterations: self.iterations,
                burn_in: burn,
            });
        }
        if self.replications == 0 {
            return Err(ConfigError::NonPositiveReplications);
        }
        if self.imputations == 0 {
            return Err(ConfigError::NonPositiveImputations);
        }
        if !(self.interval > 0.0 && self.interval < 1.0) {
            return Err(ConfigError::InvalidInterval(self.interval));
        }
        let p = &self.prior;
        if !(p.inclusion_prob > 0.0 && p.inclusion_prob < 1.0) {
            return Err(ConfigError::InvalidInclusionProb(p.inclusion_prob));
        }
        for (name, value) in [
            ("slab_variance", p.slab_variance),
            ("spike_variance", p.spike_variance),
            ("intercept_variance", p.intercept_variance),
            ("variance_shape", p.variance_shape),
            ("variance_scale", p.variance_scale),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NonPositiveHyperparameter {
                    name,
                    value,
                });
            }
        }
        if p.spike_variance >= p.slab_variance {
            return Err(ConfigError::SpikeNotBelowSlab {
                spike: p.spike_variance,
                slab: p.slab_variance,
            });
        }
        Ok(())
    }
}

/// Configuration failures, all reported before any sampling begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'iterations' must be positive")]
    NonPositiveIterations,
    #[error(
        "burn-in ({burn_in}) must be strictly below 'iterations' ({iterations}); no draws would be retained"
    )]
    BurnInExhaustsIterations { iterations: usize, burn_in: usize },
    #[error("'replications' must be at least 1")]
    NonPositiveReplications,
    #[error("'imputations' must be at least 1")]
    NonPositiveImputations,
    #[error("'interval' must lie strictly inside (0, 1), got {0}")]
    InvalidInterval(f64),
    #[error("prior inclusion probability must lie strictly inside (0, 1), got {0}")]
    InvalidInclusionProb(f64),
    #[error("prior hyperparameter '{name}' must be a positive finite number, got {value}")]
    NonPositiveHyperparameter { name: &'static str, value: f64 },
    #[error(
        "spike variance ({spike}) must be strictly below slab variance ({slab}) for the mixture prior to separate included from excluded effects"
    )]
    SpikeNotBelowSlab { spike: f64, slab: f64 },
}
