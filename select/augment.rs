//! Latent-response augmentation for binary outcomes.
//!
//! Probit data augmentation: each observed 0/1 label is replaced, once per
//! Gibbs sweep, by a draw from a unit-variance normal centered at the
//! current linear predictor and truncated to the half-line consistent with
//! the label ((-inf, 0] for a 0, [0, inf) for a 1). The latent vector then
//! plays the role of a continuous response for the remainder of the sweep
//! and is regenerated from scratch next sweep.

use ndarray::{Array1, ArrayView1};
use rand::Rng;
use rand::rngs::StdRng;
use statrs::function::erf::{erf, erf_inv};

const SQRT_2: f64 = std::f64::consts::SQRT_2;

// erf_inv saturates to +/-inf at +/-1; keep its argument strictly inside.
const ERF_BOUND: f64 = 1.0 - 1e-15;

/// One draw from N(mu, 1) truncated to [0, inf), by inverse-CDF sampling.
fn truncnorm_nonnegative(mu: f64, rng: &mut StdRng) -> f64 {
    let erf0 = erf(-mu / SQRT_2);
    let u: f64 = rng.gen_range(0.0..1.0);
    let arg = (u * (1.0 - erf0) + erf0).clamp(-ERF_BOUND, ERF_BOUND);
    // Deep in the tail the inverse CDF saturates; the truncation support
    // still has to hold, so pin the draw to the boundary.
    (mu + SQRT_2 * erf_inv(arg)).max(0.0)
}

/// One draw from N(mu, 1) truncated to (-inf, 0].
fn truncnorm_nonpositive(mu: f64, rng: &mut StdRng) -> f64 {
    let erf0 = erf(-mu / SQRT_2);
    let u: f64 = rng.gen_range(0.0..1.0);
    let arg = (u * (1.0 + erf0) - 1.0).clamp(-ERF_BOUND, ERF_BOUND);
    (mu + SQRT_2 * erf_inv(arg)).min(0.0)
}

/// Draws the latent continuous response for every observation, given the
/// current linear predictor `eta` and the observed labels. Pure data
/// augmentation: no state survives the call.
pub fn draw_latent_response(
    eta: ArrayView1<'_, f64>,
    labels: ArrayView1<'_, f64>,
    rng: &mut StdRng,
) -> Array1<f64> {
    let mut latent = Array1::<f64>::zeros(eta.len());
    for i in 0..eta.len() {
        latent[i] = if labels[i] == 1.0 {
            truncnorm_nonnegative(eta[i], rng)
        } else {
            truncnorm_nonpositive(eta[i], rng)
        };
    }
    latent
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn latent_draws_respect_the_observed_label() {
        let mut rng = StdRng::seed_from_u64(7);
        let eta = array![0.3, -0.3, 2.0, -2.0];
        let labels = array![1.0, 0.0, 0.0, 1.0];
        for _ in 0..200 {
            let z = draw_latent_response(eta.view(), labels.view(), &mut rng);
            assert!(z[0] >= 0.0);
            assert!(z[1] <= 0.0);
            assert!(z[2] <= 0.0);
            assert!(z[3] >= 0.0);
        }
    }

    #[test]
    fn latent_mean_tracks_the_linear_predictor() {
        // For mu = 2 and label 1 the truncation barely binds, so the sample
        // mean should sit close to mu.
        let mut rng = StdRng::seed_from_u64(11);
        let eta = array![2.0];
        let labels = array![1.0];
        let mut sum = 0.0;
        let draws = 20_000;
        for _ in 0..draws {
            sum += draw_latent_response(eta.view(), labels.view(), &mut rng)[0];
        }
        let mean = sum / draws as f64;
        assert!(
            (mean - 2.05).abs() < 0.05,
            "truncated-normal mean drifted: {mean}"
        );
    }

    #[test]
    fn extreme_linear_predictors_stay_finite_and_in_support() {
        let mut rng = StdRng::seed_from_u64(13);
        let eta = array![40.0, -40.0];
        let labels = array![0.0, 1.0];
        for _ in 0..100 {
            let z = draw_latent_response(eta.view(), labels.view(), &mut rng);
            assert!(z[0].is_finite() && z[0] <= 0.0);
            assert!(z[1].is_finite() && z[1] >= 0.0);
        }
    }
}
