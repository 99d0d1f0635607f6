use clap::{Parser, Subcommand};
use std::process;

use ssvs::data::{load_model_frame, load_stacked_data};
use ssvs::{SortBy, SsvsOptions, run_ssvs, run_ssvs_mi, summarize};

#[derive(Parser)]
#[command(
    name = "ssvs",
    about = "Stochastic search variable selection for regression models",
    long_about = "Runs a spike-and-slab Gibbs sampler over candidate predictors and reports, \
                  per predictor, the marginal inclusion probability and posterior effect-size \
                  summaries. Supports single datasets and stacked multiply-imputed datasets."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run SSVS on a single dataset
    #[command(about = "Run SSVS on a single TSV dataset")]
    Run {
        /// Path to a TSV file with a header row
        data: String,

        /// Name of the response column
        #[arg(long)]
        response: String,

        /// Comma-separated candidate predictor column names
        #[arg(long, value_delimiter = ',')]
        predictors: Vec<String>,

        /// Treat the response as a 0/1 label (probit augmentation)
        #[arg(long)]
        binary: bool,

        /// Independent chains to run on the dataset
        #[arg(long, default_value = "1")]
        replications: usize,

        #[command(flatten)]
        sampling: SamplingArgs,
    },

    /// Run SSVS across a stacked multiply-imputed dataset
    #[command(about = "Run SSVS over every (imputation, replication) slice of a stacked TSV")]
    Mi {
        /// Path to a stacked TSV file with a header row
        data: String,

        /// Name of the response column
        #[arg(long)]
        response: String,

        /// Comma-separated candidate predictor column names
        #[arg(long, value_delimiter = ',')]
        predictors: Vec<String>,

        /// Treat the response as a 0/1 label (probit augmentation)
        #[arg(long)]
        binary: bool,

        /// Number of imputed datasets in the stack
        #[arg(long)]
        imputations: usize,

        /// Replications per imputation
        #[arg(long, default_value = "1")]
        replications: usize,

        /// Column holding the 1-based imputation identifier
        #[arg(long, default_value = "imputation")]
        imputation_col: String,

        /// Column holding the 1-based replication identifier
        #[arg(long, default_value = "replication")]
        replication_col: String,

        #[command(flatten)]
        sampling: SamplingArgs,
    },
}

#[derive(clap::Args)]
struct SamplingArgs {
    /// Total Gibbs sweeps per chain, including burn-in
    #[arg(long, default_value = "20000")]
    iterations: usize,

    /// Sweeps discarded from the front of each chain (default: iterations / 4)
    #[arg(long)]
    burn_in: Option<usize>,

    /// Credible-interval level, strictly inside (0, 1)
    #[arg(long, default_value = "0.95")]
    interval: f64,

    /// Base seed for the per-slice RNG streams
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Show a progress bar over slices
    #[arg(long)]
    progress: bool,

    /// Sort the summary table by descending inclusion probability
    #[arg(long)]
    sort_by_mip: bool,
}

impl SamplingArgs {
    fn to_options(&self, continuous: bool, replications: usize) -> SsvsOptions {
        SsvsOptions {
            iterations: self.iterations,
            burn_in: self.burn_in,
            replications,
            interval: self.interval,
            continuous,
            progress: self.progress,
            seed: self.seed,
            ..SsvsOptions::default()
        }
    }

    fn sort(&self) -> SortBy {
        if self.sort_by_mip {
            SortBy::DescendingMip
        } else {
            SortBy::Input
        }
    }
}

fn main() {
    env_logger::init();
    if let Err(message) = run() {
        eprintln!("Error: {message}");
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            data,
            response,
            predictors,
            binary,
            replications,
            sampling,
        } => {
            let frame = load_model_frame(&data, &response, &predictors, !binary)
                .map_err(|e| e.to_string())?;
            let opts = sampling.to_options(!binary, replications);
            let result = run_ssvs(&frame, &opts).map_err(|e| e.to_string())?;
            print!("{}", summarize(&result, sampling.sort()));
        }
        Commands::Mi {
            data,
            response,
            predictors,
            binary,
            imputations,
            replications,
            imputation_col,
            replication_col,
            sampling,
        } => {
            let stacked = load_stacked_data(
                &data,
                &response,
                &predictors,
                &imputation_col,
                &replication_col,
                imputations,
                replications,
                !binary,
            )
            .map_err(|e| e.to_string())?;
            let opts = sampling.to_options(!binary, replications);
            let result = run_ssvs_mi(&stacked, &opts).map_err(|e| e.to_string())?;
            print!("{}", summarize(&result, sampling.sort()));
        }
    }
    Ok(())
}
