//! # Spike-and-Slab Gibbs Sampler
//!
//! One [`SpikeSlabSampler::sweep`] performs a full Gibbs update for a single
//! chain, in order:
//!
//! 1. every inclusion indicator, from its full conditional: the posterior
//!    odds of slab vs spike given the predictor's partial residual
//!    correlation, computed in log space;
//! 2. the whole coefficient vector jointly, from its multivariate-normal
//!    conditional (a Cholesky factorization of the precision matrix,
//!    never an explicit inverse), so posterior correlation between
//!    coefficients is preserved;
//! 3. the residual variance from its inverse-gamma conditional, for
//!    continuous responses only. Probit chains keep it pinned at 1.
//!
//! Excluded predictors are *not* zeroed: their coefficients are redrawn from
//! the spike component, so they stay near zero while remaining in the linear
//! predictor. Downstream aggregation relies on this soft shrinkage.
//!
//! The gram matrix is factorized once per slice when the sampler is built;
//! a rank-deficient design (duplicated or perfectly collinear predictors,
//! or fewer observations than coefficients) is rejected there instead of
//! surfacing later as NaN coefficients.

use ndarray::{Array1, Array2, ArrayView1};
use ndarray_linalg::cholesky::Cholesky;
use ndarray_linalg::{UPLO, error::LinalgError};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma, StandardNormal};
use thiserror::Error;

use crate::config::PriorSpec;
use crate::data::ModelFrame;

// Bernoulli probabilities are clamped away from 0 and 1 so floating-point
// underflow in extreme likelihood ratios cannot freeze an indicator.
const PROB_EPS: f64 = 1e-10;

// Relative floor on the Cholesky diagonal of the gram matrix; pivots below
// max_pivot * RANK_TOL mean the design is numerically rank deficient even
// when the factorization nominally succeeds.
const RANK_TOL: f64 = 1e-8;

/// Numerical failures inside one chain.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error(
        "the design matrix is rank deficient: perfectly collinear (e.g. duplicated) predictor columns, or fewer observations than coefficients"
    )]
    DegenerateDesign,
    #[error("Cholesky factorization of the coefficient precision matrix failed: {0}")]
    Factorization(LinalgError),
}

/// Mutable state of one chain: current coefficients (intercept first),
/// inclusion indicators (one per predictor), and residual variance.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub beta: Array1<f64>,
    pub included: Array1<u8>,
    pub sigma2: f64,
}

/// The Gibbs sampler for one dataset slice. Holds only immutable,
/// slice-derived quantities; all chain state is passed in by the caller, so
/// independent chains can share one sampler.
#[derive(Debug)]
pub struct SpikeSlabSampler<'a> {
    frame: &'a ModelFrame,
    prior: &'a PriorSpec,
    xtx: Array2<f64>,
}

impl<'a> SpikeSlabSampler<'a> {
    /// Builds the sampler and verifies the design is usable: the gram
    /// matrix X'X must admit a Cholesky factorization with no collapsed
    /// pivot.
    pub fn new(frame: &'a ModelFrame, prior: &'a PriorSpec) -> Result<Self, SamplerError> {
        let xtx = frame.x.t().dot(&frame.x);
        let factor = xtx
            .cholesky(UPLO::Lower)
            .map_err(|_| SamplerError::DegenerateDesign)?;
        let mut min_pivot = f64::INFINITY;
        let mut max_pivot = 0.0_f64;
        for k in 0..factor.nrows() {
            min_pivot = min_pivot.min(factor[[k, k]]);
            max_pivot = max_pivot.max(factor[[k, k]]);
        }
        if !(min_pivot > max_pivot * RANK_TOL) {
            return Err(SamplerError::DegenerateDesign);
        }
        Ok(Self { frame, prior, xtx })
    }

    /// Fresh chain state: every predictor starts included, coefficients at
    /// zero, unit residual variance.
    pub fn initial_state(&self) -> ChainState {
        ChainState {
            beta: Array1::zeros(self.frame.dim()),
            included: Array1::ones(self.frame.n_predictors()),
            sigma2: 1.0,
        }
    }

    /// One full Gibbs sweep over `state`, using `y_star` as the working
    /// response (the observed response, or the latent augmentation for
    /// binary models).
    pub fn sweep(
        &self,
        state: &mut ChainState,
        y_star: ArrayView1<'_, f64>,
        rng: &mut StdRng,
    ) -> Result<(), SamplerError> {
        let xty = self.frame.x.t().dot(&y_star);
        self.update_indicators(state, &xty, rng);
        self.draw_coefficients(state, &xty, rng)?;
        if self.frame.continuous {
            self.draw_residual_variance(state, y_star, rng);
        }
        Ok(())
    }

    /// Redraws every inclusion indicator from its full conditional, holding
    /// the other indicators and the coefficient vector fixed.
    fn update_indicators(&self, state: &mut ChainState, xty: &Array1<f64>, rng: &mut StdRng) {
        let sigma2 = state.sigma2;
        let prior_log_odds =
            (self.prior.inclusion_prob / (1.0 - self.prior.inclusion_prob)).ln();
        // X'Xb is enough to form every partial residual correlation without
        // touching the n-row design again.
        let xtx_beta = self.xtx.dot(&state.beta);

        for j in 0..state.included.len() {
            let col = j + 1;
            let l = self.xtx[[col, col]];
            // r = x_j' (y* - X b + x_j b_j): the correlation between the
            // predictor and the residual with its own contribution restored.
            let r = xty[col] - xtx_beta[col] + l * state.beta[col];
            let log_odds = prior_log_odds
                + log_marginal_likelihood(r, l, sigma2, self.prior.slab_variance)
                - log_marginal_likelihood(r, l, sigma2, self.prior.spike_variance);
            let prob = logistic(log_odds).clamp(PROB_EPS, 1.0 - PROB_EPS);
            state.included[j] = u8::from(rng.r#gen::<f64>() < prob);
        }
    }

    /// Draws the full coefficient vector jointly from N(mu, A^-1) with
    /// A = X'X / sigma^2 + D^-1, D the diagonal of prior variances implied
    /// by the current indicator pattern.
    fn draw_coefficients(
        &self,
        state: &mut ChainState,
        xty: &Array1<f64>,
        rng: &mut StdRng,
    ) -> Result<(), SamplerError> {
        let dim = self.frame.dim();
        let mut precision = &self.xtx / state.sigma2;
        precision[[0, 0]] += 1.0 / self.prior.intercept_variance;
        for j in 0..state.included.len() {
            let prior_variance = if state.included[j] == 1 {
                self.prior.slab_variance
            } else {
                self.prior.spike_variance
            };
            precision[[j + 1, j + 1]] += 1.0 / prior_variance;
        }

        let chol = precision
            .cholesky(UPLO::Lower)
            .map_err(SamplerError::Factorization)?;

        // mu solves A mu = X'y*/sigma^2 via the two triangular systems.
        let rhs = xty / state.sigma2;
        let w = forward_substitute(&chol, &rhs);
        let mean = back_substitute(&chol, &w);

        // beta = mu + L^-T z has covariance (L L^T)^-1 = A^-1.
        let z = Array1::from_shape_fn(dim, |_| rng.sample::<f64, _>(StandardNormal));
        let noise = back_substitute(&chol, &z);
        state.beta = mean + noise;
        Ok(())
    }

    /// sigma^2 | rest ~ InvGamma(a + n/2, b + RSS/2), drawn as the
    /// reciprocal of a gamma variate.
    fn draw_residual_variance(
        &self,
        state: &mut ChainState,
        y_star: ArrayView1<'_, f64>,
        rng: &mut StdRng,
    ) {
        let fitted = self.frame.x.dot(&state.beta);
        let rss: f64 = y_star
            .iter()
            .zip(fitted.iter())
            .map(|(&y, &f)| (y - f) * (y - f))
            .sum();
        let shape = self.prior.variance_shape + 0.5 * self.frame.n_obs() as f64;
        let rate = self.prior.variance_scale + 0.5 * rss;
        let gamma = Gamma::new(shape, 1.0 / rate).expect("shape and scale are positive");
        state.sigma2 = gamma.sample(rng).max(f64::MIN_POSITIVE).recip();
    }
}

/// Log marginal likelihood contribution of one predictor whose coefficient
/// is integrated out under a N(0, v) prior, given its partial residual
/// correlation `r` and squared column norm `l`:
/// -ln(1 + l v / s2)/2 + r^2 v / (2 s2 (s2 + l v)).
fn log_marginal_likelihood(r: f64, l: f64, sigma2: f64, v: f64) -> f64 {
    -0.5 * (1.0 + l * v / sigma2).ln() + 0.5 * r * r * v / (sigma2 * (sigma2 + l * v))
}

fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Solves L w = b for lower-triangular L.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut w = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut acc = b[i];
        for k in 0..i {
            acc -= l[[i, k]] * w[k];
        }
        w[i] = acc / l[[i, i]];
    }
    w
}

/// Solves L^T x = b for lower-triangular L.
fn back_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut acc = b[i];
        for k in (i + 1)..n {
            acc -= l[[k, i]] * x[k];
        }
        x[i] = acc / l[[i, i]];
    }
    x
}
