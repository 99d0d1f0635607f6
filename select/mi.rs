//! Imputation/replication orchestrator.
//!
//! Enumerates every (imputation, replication) slice, runs one independent
//! chain per slice, and folds the per-slice summaries into the final
//! [`AggregatedResult`]. Slices share no mutable state and each derives its
//! own RNG stream from the base seed, so the grid is fanned out across the
//! rayon thread pool and the collected results are identical to a serial
//! run. The progress bar is an observer only: it is attached after all
//! validation and never influences sampler state or the draw sequence.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::io::IsTerminal;
use thiserror::Error;

use crate::chain::{run_chain, slice_seed};
use crate::config::{ConfigError, SsvsOptions};
use crate::data::{DataError, ModelFrame, StackedData};
use crate::results::{
    AggregatedResult, SliceSummary, mean_across_replications, spread_across_imputations,
    summarize_draws,
};
use crate::sampler::SamplerError;

/// Any failure of a full SSVS run.
#[derive(Error, Debug)]
pub enum SsvsError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("imputation {imputation}, replication {replication}: {source}")]
    Slice {
        imputation: usize,
        replication: usize,
        source: SamplerError,
    },
}

/// Runs SSVS on a single dataset: `opts.replications` independent chains
/// over the same frame, aggregated as one imputation. `opts.imputations`
/// is not consulted here; multiply-imputed data goes through
/// [`run_ssvs_mi`].
pub fn run_ssvs(frame: &ModelFrame, opts: &SsvsOptions) -> Result<AggregatedResult, SsvsError> {
    opts.validate()?;
    log::info!(
        "SSVS: {} observations, {} predictors, {} replications, {} iterations ({} burn-in).",
        frame.n_obs(),
        frame.n_predictors(),
        opts.replications,
        opts.iterations,
        opts.burn_in_count()
    );
    run_grid(|_, _| frame, 1, opts.replications, &frame.predictor_names, opts)
}

/// Runs SSVS across the full imputation × replication grid of a stacked
/// multiply-imputed dataset. The grid shape comes from the validated
/// [`StackedData`] itself.
pub fn run_ssvs_mi(
    stacked: &StackedData,
    opts: &SsvsOptions,
) -> Result<AggregatedResult, SsvsError> {
    opts.validate()?;
    log::info!(
        "SSVS-MI: {} imputations x {} replications, {} predictors, {} iterations ({} burn-in).",
        stacked.imputations,
        stacked.replications,
        stacked.predictor_names.len(),
        opts.iterations,
        opts.burn_in_count()
    );
    run_grid(
        |m, r| stacked.frame(m, r),
        stacked.imputations,
        stacked.replications,
        &stacked.predictor_names,
        opts,
    )
}

/// Shared driver: samples every slice of an M x R grid and folds the
/// summaries. `frame_for` maps 1-based (imputation, replication) indices to
/// the slice's data.
fn run_grid<'a, F>(
    frame_for: F,
    imputations: usize,
    replications: usize,
    predictor_names: &[String],
    opts: &SsvsOptions,
) -> Result<AggregatedResult, SsvsError>
where
    F: Fn(usize, usize) -> &'a ModelFrame + Sync,
{
    let cells: Vec<(usize, usize)> = (1..=imputations)
        .cartesian_product(1..=replications)
        .collect();
    let bar = create_progress_bar(cells.len() as u64, opts.progress);

    // One summary per cell, in imputation-major order regardless of which
    // worker finishes first.
    let slice_summaries: Vec<SliceSummary> = cells
        .par_iter()
        .map(|&(m, r)| {
            let frame = frame_for(m, r);
            let mut rng = StdRng::seed_from_u64(slice_seed(opts.seed, m, r));
            let draws = run_chain(frame, opts, &mut rng).map_err(|source| SsvsError::Slice {
                imputation: m,
                replication: r,
                source,
            })?;
            bar.inc(1);
            log::debug!(
                "finished imputation {m}, replication {r}: {} retained draws",
                draws.retained()
            );
            Ok(summarize_draws(&draws, opts.interval))
        })
        .collect::<Result<_, SsvsError>>()?;
    bar.finish_and_clear();

    let per_imputation: Vec<SliceSummary> = slice_summaries
        .chunks(replications)
        .map(mean_across_replications)
        .collect();

    Ok(spread_across_imputations(
        &per_imputation,
        predictor_names,
        opts.interval,
        replications,
    ))
}

fn create_progress_bar(len: u64, enabled: bool) -> ProgressBar {
    let draw_target = if enabled && std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };
    let bar = ProgressBar::with_draw_target(Some(len), draw_target);
    bar.set_style(
        ProgressStyle::with_template("> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} slices ({eta})")
            .expect("progress template is valid")
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar
}
