//! End-to-end statistical behavior of the SSVS engine on synthetic data.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, StandardNormal};

use ssvs::chain::{run_chain, slice_seed};
use ssvs::data::{ModelFrame, StackedData, frame_from_columns};
use ssvs::results::{mean_across_replications, spread_across_imputations, summarize_draws};
use ssvs::{SortBy, SsvsError, SsvsOptions, run_ssvs, run_ssvs_mi, summarize};

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

fn standard_normal_column(n: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)).collect()
}

/// Two uncorrelated predictors: x1 carries a strong true effect, x2 none.
fn scenario_a_frame(seed: u64, n: usize) -> ModelFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let x1 = standard_normal_column(n, &mut rng);
    let x2 = standard_normal_column(n, &mut rng);
    let y: Vec<f64> = x1.iter().map(|&v| 2.0 * v + noise.sample(&mut rng)).collect();
    frame_from_columns(&names(&["x1", "x2"]), &[x1, x2], y, true).unwrap()
}

/// One 45-row slice of the 5-predictor scenario-B dataset.
fn scenario_b_frame(seed: u64) -> ModelFrame {
    let n = 45;
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let columns: Vec<Vec<f64>> = (0..5).map(|_| standard_normal_column(n, &mut rng)).collect();
    let y: Vec<f64> = (0..n)
        .map(|i| 1.2 * columns[0][i] - 0.8 * columns[1][i] + noise.sample(&mut rng))
        .collect();
    frame_from_columns(&names(&["x1", "x2", "x3", "x4", "x5"]), &columns, y, true).unwrap()
}

fn scenario_b_stack() -> StackedData {
    let (imputations, replications) = (3, 3);
    let mut frames = Vec::new();
    for m in 0..imputations {
        for r in 0..replications {
            // Distinct data per cell, reproducible across test runs.
            frames.push(scenario_b_frame(1000 + (m * replications + r) as u64));
        }
    }
    StackedData {
        frames,
        imputations,
        replications,
        predictor_names: names(&["x1", "x2", "x3", "x4", "x5"]),
    }
}

#[test]
fn scenario_a_separates_strong_from_null_predictor() {
    let frame = scenario_a_frame(41, 100);
    let opts = SsvsOptions {
        iterations: 2400,
        seed: 11,
        ..SsvsOptions::default()
    };
    let result = run_ssvs(&frame, &opts).unwrap();

    let strong = &result.predictors[0];
    let null = &result.predictors[1];
    assert!(
        strong.mip.mean > 0.7,
        "strong predictor MIP too low: {}",
        strong.mip.mean
    );
    assert!(null.mip.mean < 0.3, "null predictor MIP too high: {}", null.mip.mean);

    // The strong effect's posterior mean should sit near the generating
    // coefficient.
    assert!((strong.mean_nonzero_beta.mean - 2.0).abs() < 0.3);

    for p in &result.predictors {
        assert!(p.mip.mean >= 0.0 && p.mip.mean <= 1.0);
    }
}

#[test]
fn results_are_bit_identical_across_repeated_invocations() {
    let frame = scenario_a_frame(43, 60);
    let opts = SsvsOptions {
        iterations: 800,
        replications: 2,
        seed: 97,
        ..SsvsOptions::default()
    };
    let first = run_ssvs(&frame, &opts).unwrap();
    let second = run_ssvs(&frame, &opts).unwrap();
    assert_eq!(first, second);

    let stacked = scenario_b_stack();
    let mi_opts = SsvsOptions {
        iterations: 600,
        seed: 5,
        ..SsvsOptions::default()
    };
    let mi_first = run_ssvs_mi(&stacked, &mi_opts).unwrap();
    let mi_second = run_ssvs_mi(&stacked, &mi_opts).unwrap();
    assert_eq!(mi_first, mi_second);
}

#[test]
fn credible_intervals_bracket_the_posterior_mean_at_every_level() {
    let frame = scenario_a_frame(47, 80);
    for interval in [0.5, 0.8, 0.95, 0.99] {
        let opts = SsvsOptions {
            iterations: 1200,
            interval,
            seed: 13,
            ..SsvsOptions::default()
        };
        let result = run_ssvs(&frame, &opts).unwrap();
        for p in &result.predictors {
            assert!(
                p.lower.mean <= p.mean_beta.mean && p.mean_beta.mean <= p.upper.mean,
                "interval {interval} does not bracket the mean for {}",
                p.name
            );
        }
    }
}

#[test]
fn scenario_b_full_mi_grid_yields_finite_per_predictor_spreads() {
    let stacked = scenario_b_stack();
    let opts = SsvsOptions {
        iterations: 1000,
        seed: 19,
        ..SsvsOptions::default()
    };
    let result = run_ssvs_mi(&stacked, &opts).unwrap();

    assert_eq!(result.predictors.len(), 5);
    assert_eq!(result.imputations, 3);
    assert_eq!(result.replications, 3);
    for p in &result.predictors {
        assert!(p.mip.mean >= 0.0 && p.mip.mean <= 1.0);
        for spread in [&p.mip, &p.mean_beta, &p.lower, &p.upper] {
            assert!(spread.mean.is_finite());
            assert!(spread.sd.is_finite());
            assert!(spread.min.is_finite());
            assert!(spread.max.is_finite());
            assert!(spread.min <= spread.mean && spread.mean <= spread.max);
        }
    }

    // The generating effects should be the top-ranked predictors.
    let table = summarize(&result, SortBy::DescendingMip);
    assert_eq!(table.rows.len(), 5);
    let top_two: Vec<&str> = table.rows[..2].iter().map(|r| r.predictor.as_str()).collect();
    assert!(top_two.contains(&"x1"));
    assert!(top_two.contains(&"x2"));
}

#[test]
fn orchestrator_matches_a_manual_one_pass_fold_over_all_slices() {
    let stacked = scenario_b_stack();
    let opts = SsvsOptions {
        iterations: 500,
        seed: 23,
        ..SsvsOptions::default()
    };
    let via_orchestrator = run_ssvs_mi(&stacked, &opts).unwrap();

    // Recompute all 9 slice summaries directly and fold them by hand.
    let mut per_imputation = Vec::new();
    for m in 1..=stacked.imputations {
        let mut replication_summaries = Vec::new();
        for r in 1..=stacked.replications {
            let mut rng = StdRng::seed_from_u64(slice_seed(opts.seed, m, r));
            let draws = run_chain(stacked.frame(m, r), &opts, &mut rng).unwrap();
            replication_summaries.push(summarize_draws(&draws, opts.interval));
        }
        per_imputation.push(mean_across_replications(&replication_summaries));
    }
    let manual = spread_across_imputations(
        &per_imputation,
        &stacked.predictor_names,
        opts.interval,
        stacked.replications,
    );

    assert_eq!(via_orchestrator, manual);
}

#[test]
fn binary_response_path_recovers_a_strong_probit_effect() {
    let n = 150;
    let mut rng = StdRng::seed_from_u64(53);
    let x1 = standard_normal_column(n, &mut rng);
    let x2 = standard_normal_column(n, &mut rng);
    let labels: Vec<f64> = x1
        .iter()
        .map(|&v| {
            let latent = 1.5 * v + rng.sample::<f64, _>(StandardNormal);
            if latent > 0.0 { 1.0 } else { 0.0 }
        })
        .collect();
    let frame = frame_from_columns(&names(&["x1", "x2"]), &[x1, x2], labels, false).unwrap();

    let opts = SsvsOptions {
        iterations: 2400,
        continuous: false,
        seed: 59,
        ..SsvsOptions::default()
    };
    let result = run_ssvs(&frame, &opts).unwrap();
    assert!(result.predictors[0].mip.mean > 0.7);
    assert!(result.predictors[0].mean_nonzero_beta.mean > 0.5);
    assert!(result.predictors[1].mip.mean < 0.5);

    // The probit chain never updates the residual variance.
    let mut chain_rng = StdRng::seed_from_u64(61);
    let draws = run_chain(&frame, &opts, &mut chain_rng).unwrap();
    assert!(draws.sigma2.iter().all(|&v| v == 1.0));
}

#[test]
fn duplicated_predictor_columns_fail_instead_of_returning_nan() {
    let mut rng = StdRng::seed_from_u64(67);
    let x1 = standard_normal_column(30, &mut rng);
    let y: Vec<f64> = x1.iter().map(|&v| v + 0.1).collect();
    let frame =
        frame_from_columns(&names(&["a", "b"]), &[x1.clone(), x1], y, true).unwrap();
    let opts = SsvsOptions {
        iterations: 400,
        ..SsvsOptions::default()
    };
    match run_ssvs(&frame, &opts) {
        Err(SsvsError::Slice { imputation: 1, replication: 1, .. }) => {}
        other => panic!("expected a per-slice degeneracy error, got {other:?}"),
    }
}

#[test]
fn never_included_predictors_surface_as_nan_not_a_crash() {
    // A chain that retains very few draws can plausibly never include the
    // null predictor; force the situation directly via the chain API and a
    // tiny retained window.
    let frame = scenario_a_frame(71, 120);
    let opts = SsvsOptions {
        iterations: 40,
        burn_in: Some(36),
        seed: 73,
        ..SsvsOptions::default()
    };
    let mut rng = StdRng::seed_from_u64(slice_seed(opts.seed, 1, 1));
    let draws = run_chain(&frame, &opts, &mut rng).unwrap();
    let summary = summarize_draws(&draws, 0.95);
    for j in 0..2 {
        assert!(summary.mip[j] >= 0.0 && summary.mip[j] <= 1.0);
        if summary.mip[j] == 0.0 {
            assert!(summary.mean_nonzero_beta[j].is_nan());
        } else {
            assert!(summary.mean_nonzero_beta[j].is_finite());
        }
    }
}

#[test]
fn retained_draw_matrix_has_one_record_per_kept_sweep() {
    let frame = scenario_a_frame(79, 50);
    let opts = SsvsOptions {
        iterations: 200,
        burn_in: Some(50),
        ..SsvsOptions::default()
    };
    let mut rng = StdRng::seed_from_u64(83);
    let draws = run_chain(&frame, &opts, &mut rng).unwrap();
    assert_eq!(draws.retained(), 150);
    assert_eq!(draws.beta.nrows(), 150);
    assert_eq!(draws.included.nrows(), 150);
    assert_eq!(draws.sigma2.len(), 150);
    assert!(draws.sigma2.iter().all(|&v| v > 0.0));
}
