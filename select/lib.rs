//! Stochastic search variable selection (SSVS) for linear and probit
//! regression.
//!
//! The crate estimates, for every candidate predictor in a regression model,
//! the posterior probability that the predictor belongs in the model (its
//! marginal inclusion probability, MIP) together with the posterior
//! distribution of its effect size. Estimation is by Gibbs sampling under a
//! spike-and-slab mixture prior: each sweep redraws the per-predictor
//! inclusion indicators, the full coefficient vector, and (for continuous
//! responses) the residual variance. Binary responses are handled by probit
//! data augmentation with the residual variance pinned at one.
//!
//! Multiply-imputed data is supported by running independent chains over
//! every (imputation, replication) cell of a stacked dataset and folding the
//! per-cell summaries into across-imputation mean, standard deviation,
//! minimum and maximum per statistic.
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod augment;
pub mod chain;
pub mod config;
pub mod data;
pub mod mi;
pub mod results;
pub mod sampler;

pub use config::{ConfigError, PriorSpec, SsvsOptions};
pub use data::{DataError, ModelFrame, StackedData};
pub use mi::{SsvsError, run_ssvs, run_ssvs_mi};
pub use results::{AggregatedResult, SortBy, SummaryTable, summarize};
