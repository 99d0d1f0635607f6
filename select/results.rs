//! Posterior summaries and cross-chain aggregation.
//!
//! One retained chain reduces to a [`SliceSummary`]; replication summaries
//! average into an imputation-level summary; imputation summaries fold into
//! the final [`AggregatedResult`] carrying mean, standard deviation, minimum
//! and maximum of every statistic. The fold is plain commutative arithmetic
//! over per-slice values, so the result does not depend on the order slices
//! finished in.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::ChainDraws;

/// Per-predictor posterior statistics for one chain.
///
/// `mean_beta` averages every retained draw, spike draws included;
/// `mean_nonzero_beta` averages only draws where the predictor was in the
/// model and is NaN when no retained draw included it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceSummary {
    pub mip: Vec<f64>,
    pub mean_beta: Vec<f64>,
    pub mean_nonzero_beta: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Reduces one chain's retained draws to per-predictor statistics at the
/// given credible level. Interval bounds are empirical quantiles of the
/// coefficient draws at (1 - interval)/2 and 1 - (1 - interval)/2.
pub fn summarize_draws(draws: &ChainDraws, interval: f64) -> SliceSummary {
    let kept = draws.retained();
    let predictors = draws.included.ncols();
    let tail = (1.0 - interval) / 2.0;

    let mut mip = Vec::with_capacity(predictors);
    let mut mean_beta = Vec::with_capacity(predictors);
    let mut mean_nonzero_beta = Vec::with_capacity(predictors);
    let mut lower = Vec::with_capacity(predictors);
    let mut upper = Vec::with_capacity(predictors);

    for j in 0..predictors {
        // Coefficient column j + 1: column 0 is the intercept, which is
        // always in the model and not part of the selection report.
        let betas = draws.beta.column(j + 1);
        let included = draws.included.column(j);

        let n_included = included.iter().filter(|&&g| g == 1).count();
        mip.push(n_included as f64 / kept as f64);
        mean_beta.push(betas.sum() / kept as f64);
        if n_included > 0 {
            let sum_included: f64 = betas
                .iter()
                .zip(included.iter())
                .filter(|&(_, &g)| g == 1)
                .map(|(&b, _)| b)
                .sum();
            mean_nonzero_beta.push(sum_included / n_included as f64);
        } else {
            mean_nonzero_beta.push(f64::NAN);
        }

        let mut sorted: Vec<f64> = betas.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        lower.push(empirical_quantile(&sorted, tail));
        upper.push(empirical_quantile(&sorted, 1.0 - tail));
    }

    SliceSummary {
        mip,
        mean_beta,
        mean_nonzero_beta,
        lower,
        upper,
    }
}

/// Empirical quantile of an ascending-sorted sample, with linear
/// interpolation between adjacent order statistics.
pub fn empirical_quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = position - lo as f64;
        sorted[lo] * (1.0 - w) + sorted[hi] * w
    }
}

/// Averages replication summaries into one imputation-level summary.
/// The nonzero-coefficient mean is averaged over the replications where it
/// is defined, and stays NaN only if it is NaN in every replication.
pub fn mean_across_replications(summaries: &[SliceSummary]) -> SliceSummary {
    assert!(!summaries.is_empty());
    let predictors = summaries[0].mip.len();
    let stat_mean = |pick: fn(&SliceSummary) -> &Vec<f64>| -> Vec<f64> {
        (0..predictors)
            .map(|j| {
                summaries.iter().map(|s| pick(s)[j]).sum::<f64>() / summaries.len() as f64
            })
            .collect()
    };

    let mean_nonzero_beta = (0..predictors)
        .map(|j| {
            let defined: Vec<f64> = summaries
                .iter()
                .map(|s| s.mean_nonzero_beta[j])
                .filter(|v| !v.is_nan())
                .collect();
            if defined.is_empty() {
                f64::NAN
            } else {
                defined.iter().sum::<f64>() / defined.len() as f64
            }
        })
        .collect();

    SliceSummary {
        mip: stat_mean(|s| &s.mip),
        mean_beta: stat_mean(|s| &s.mean_beta),
        mean_nonzero_beta,
        lower: stat_mean(|s| &s.lower),
        upper: stat_mean(|s| &s.upper),
    }
}

/// Mean, standard deviation, minimum and maximum of one statistic across
/// imputations. The standard deviation uses the sample (M - 1) denominator
/// and is 0 for a single imputation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

impl Spread {
    fn from_values(values: &[f64]) -> Self {
        let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if defined.is_empty() {
            return Self {
                mean: f64::NAN,
                sd: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        let n = defined.len();
        let mean = defined.iter().sum::<f64>() / n as f64;
        let sd = if n > 1 {
            (defined.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64)
                .sqrt()
        } else {
            0.0
        };
        let min = defined.iter().copied().fold(f64::INFINITY, f64::min);
        let max = defined.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { mean, sd, min, max }
    }
}

/// The full posterior report for one predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSummary {
    pub name: String,
    pub mip: Spread,
    pub mean_beta: Spread,
    pub mean_nonzero_beta: Spread,
    pub lower: Spread,
    pub upper: Spread,
}

/// Final output of a run: per-predictor statistics folded across all
/// imputations, plus the run shape needed to interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub predictors: Vec<PredictorSummary>,
    pub interval: f64,
    pub imputations: usize,
    pub replications: usize,
}

/// Folds imputation-level summaries into the final per-predictor result.
pub fn spread_across_imputations(
    per_imputation: &[SliceSummary],
    predictor_names: &[String],
    interval: f64,
    replications: usize,
) -> AggregatedResult {
    let collect = |pick: fn(&SliceSummary) -> &Vec<f64>, j: usize| -> Vec<f64> {
        per_imputation.iter().map(|s| pick(s)[j]).collect()
    };

    let predictors = predictor_names
        .iter()
        .enumerate()
        .map(|(j, name)| PredictorSummary {
            name: name.clone(),
            mip: Spread::from_values(&collect(|s| &s.mip, j)),
            mean_beta: Spread::from_values(&collect(|s| &s.mean_beta, j)),
            mean_nonzero_beta: Spread::from_values(&collect(|s| &s.mean_nonzero_beta, j)),
            lower: Spread::from_values(&collect(|s| &s.lower, j)),
            upper: Spread::from_values(&collect(|s| &s.upper, j)),
        })
        .collect();

    AggregatedResult {
        predictors,
        interval,
        imputations: per_imputation.len(),
        replications,
    }
}

/// Row ordering of the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Keep predictors in the order the caller named them.
    Input,
    /// Most-included predictors first.
    DescendingMip,
}

/// One row of the rendered summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub predictor: String,
    pub mip: f64,
    pub mean_beta: f64,
    pub mean_nonzero_beta: f64,
    pub lower: f64,
    pub upper: f64,
}

/// The per-predictor summary table consumed by the CLI and any plotting
/// front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
    pub interval: f64,
}

/// Builds the {MIP, mean beta, mean nonzero beta, CI bounds} table from an
/// aggregated result.
pub fn summarize(result: &AggregatedResult, sort: SortBy) -> SummaryTable {
    let mut rows: Vec<SummaryRow> = result
        .predictors
        .iter()
        .map(|p| SummaryRow {
            predictor: p.name.clone(),
            mip: p.mip.mean,
            mean_beta: p.mean_beta.mean,
            mean_nonzero_beta: p.mean_nonzero_beta.mean,
            lower: p.lower.mean,
            upper: p.upper.mean,
        })
        .collect();
    if sort == SortBy::DescendingMip {
        rows.sort_by(|a, b| {
            b.mip
                .partial_cmp(&a.mip)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    SummaryTable {
        rows,
        interval: result.interval,
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = self.interval * 100.0;
        writeln!(
            f,
            "{:<16} {:>8} {:>12} {:>14} {:>12} {:>12}",
            "predictor", "MIP", "mean beta", "nonzero beta",
            format!("{level:.0}% lower"), format!("{level:.0}% upper"),
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<16} {:>8.4} {:>12.4} {:>14.4} {:>12.4} {:>12.4}",
                row.predictor, row.mip, row.mean_beta, row.mean_nonzero_beta,
                row.lower, row.upper,
            )?;
        }
        Ok(())
    }
}
