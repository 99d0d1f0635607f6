//! # Data Loading and Validation
//!
//! Exclusive entry point for user-provided data. Response, predictor and
//! identifier names are resolved to columns exactly once, here; everything
//! past this module operates on positional `ndarray` containers. Failures
//! are assumed to be user-input errors, so the `DataError` enum aims for
//! actionable messages.
//!
//! A [`ModelFrame`] is one immutable dataset slice with the intercept column
//! already prepended. A [`StackedData`] holds the full imputation ×
//! replication grid of frames for multiply-imputed runs, validated so that
//! every expected cell is present and replications of the same imputation
//! agree on observation count.

use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// One validated dataset slice, ready for sampling.
#[derive(Debug, Clone)]
pub struct ModelFrame {
    /// Design matrix, shape [n_obs, n_predictors + 1]. Column 0 is the
    /// intercept column of ones; predictor columns follow in the order the
    /// caller named them.
    pub x: Array2<f64>,
    /// Response vector. Real-valued for continuous models, 0/1 labels
    /// otherwise.
    pub y: Array1<f64>,
    /// Predictor names, aligned with columns `1..` of `x`.
    pub predictor_names: Vec<String>,
    /// Whether `y` is a continuous response.
    pub continuous: bool,
}

impl ModelFrame {
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_predictors(&self) -> usize {
        self.predictor_names.len()
    }

    /// Number of coefficients, intercept included.
    pub fn dim(&self) -> usize {
        self.n_predictors() + 1
    }
}

/// The full grid of slices for a multiply-imputed run, stored
/// imputation-major: `frames[(m - 1) * replications + (r - 1)]` is the slice
/// for imputation `m`, replication `r`.
#[derive(Debug, Clone)]
pub struct StackedData {
    pub frames: Vec<ModelFrame>,
    pub imputations: usize,
    pub replications: usize,
    pub predictor_names: Vec<String>,
}

impl StackedData {
    /// The slice for 1-based (imputation, replication) indices.
    pub fn frame(&self, imputation: usize, replication: usize) -> &ModelFrame {
        &self.frames[(imputation - 1) * self.replications + (replication - 1)]
    }
}

/// All data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input data. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error("Missing or null values were found in the required column '{0}'. Complete data is required.")]
    MissingValuesFound(String),
    #[error("Non-finite values (NaN or Infinity) were found in the required column '{0}'.")]
    NonFiniteValuesFound(String),
    #[error("At least one predictor column must be named.")]
    NoPredictors,
    #[error("Predictor column '{0}' was named more than once.")]
    DuplicatePredictor(String),
    #[error("The input data contains no rows.")]
    EmptyData,
    #[error(
        "Predictor column '{column}' has {found} values but the response has {expected}."
    )]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error(
        "A binary response was requested but column '{column}' contains {value} at row {row}; only 0 and 1 are allowed."
    )]
    ResponseNotBinary {
        column: String,
        value: f64,
        row: usize,
    },
    #[error(
        "Identifier column '{column}' contains {value}, which is not an integer in 1..={max}."
    )]
    IdentifierOutOfRange {
        column: String,
        value: f64,
        max: usize,
    },
    #[error("No rows were found for imputation {imputation}, replication {replication}.")]
    MissingSlice {
        imputation: usize,
        replication: usize,
    },
    #[error(
        "Imputation {imputation} has {expected} observations in replication 1 but {found} in replication {replication}; replications of one imputation must align."
    )]
    ObservationCountMismatch {
        imputation: usize,
        replication: usize,
        expected: usize,
        found: usize,
    },
}

/// Loads a single (unstacked) dataset from a tab-separated file.
pub fn load_model_frame(
    path: &str,
    response: &str,
    predictors: &[String],
    continuous: bool,
) -> Result<ModelFrame, DataError> {
    let df = internal::read_tsv(path)?;
    frame_from_dataframe(&df, response, predictors, continuous)
}

/// Loads a stacked multiply-imputed dataset from a tab-separated file.
#[allow(clippy::too_many_arguments)]
pub fn load_stacked_data(
    path: &str,
    response: &str,
    predictors: &[String],
    imputation_column: &str,
    replication_column: &str,
    imputations: usize,
    replications: usize,
    continuous: bool,
) -> Result<StackedData, DataError> {
    let df = internal::read_tsv(path)?;
    stack_from_dataframe(
        &df,
        response,
        predictors,
        imputation_column,
        replication_column,
        imputations,
        replications,
        continuous,
    )
}

/// Builds a single slice from an in-memory DataFrame.
pub fn frame_from_dataframe(
    df: &DataFrame,
    response: &str,
    predictors: &[String],
    continuous: bool,
) -> Result<ModelFrame, DataError> {
    internal::check_predictor_names(predictors)?;
    internal::check_columns_exist(df, response, predictors, &[])?;

    let y = internal::extract_numeric_column(df, response)?;
    let columns: Vec<Vec<f64>> = predictors
        .iter()
        .map(|name| internal::extract_numeric_column(df, name))
        .collect::<Result<_, _>>()?;
    internal::build_frame(y, &columns, predictors, continuous, response)
}

/// Builds one slice directly from column vectors. Intended for synthetic
/// data and tests; the predictor columns must all share `y`'s length.
pub fn frame_from_columns(
    predictor_names: &[String],
    columns: &[Vec<f64>],
    y: Vec<f64>,
    continuous: bool,
) -> Result<ModelFrame, DataError> {
    internal::check_predictor_names(predictor_names)?;
    internal::build_frame(y, columns, predictor_names, continuous, "response")
}

/// Partitions a stacked DataFrame into its imputation × replication grid.
#[allow(clippy::too_many_arguments)]
pub fn stack_from_dataframe(
    df: &DataFrame,
    response: &str,
    predictors: &[String],
    imputation_column: &str,
    replication_column: &str,
    imputations: usize,
    replications: usize,
    continuous: bool,
) -> Result<StackedData, DataError> {
    internal::check_predictor_names(predictors)?;
    internal::check_columns_exist(
        df,
        response,
        predictors,
        &[imputation_column, replication_column],
    )?;

    let imp_ids = internal::extract_identifier_column(df, imputation_column, imputations)?;
    let rep_ids = internal::extract_identifier_column(df, replication_column, replications)?;
    let y = internal::extract_numeric_column(df, response)?;
    let columns: Vec<Vec<f64>> = predictors
        .iter()
        .map(|name| internal::extract_numeric_column(df, name))
        .collect::<Result<_, _>>()?;

    // Row indices per (imputation, replication) cell, in file order.
    let mut cells: Vec<Vec<usize>> = vec![Vec::new(); imputations * replications];
    for (row, (&m, &r)) in imp_ids.iter().zip(rep_ids.iter()).enumerate() {
        cells[(m - 1) * replications + (r - 1)].push(row);
    }

    let mut frames = Vec::with_capacity(imputations * replications);
    for m in 1..=imputations {
        let expected = cells[(m - 1) * replications].len();
        for r in 1..=replications {
            let rows = &cells[(m - 1) * replications + (r - 1)];
            if rows.is_empty() {
                return Err(DataError::MissingSlice {
                    imputation: m,
                    replication: r,
                });
            }
            if rows.len() != expected {
                return Err(DataError::ObservationCountMismatch {
                    imputation: m,
                    replication: r,
                    expected,
                    found: rows.len(),
                });
            }
            let y_slice: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
            let col_slices: Vec<Vec<f64>> = columns
                .iter()
                .map(|col| rows.iter().map(|&i| col[i]).collect())
                .collect();
            frames.push(internal::build_frame(
                y_slice,
                &col_slices,
                predictors,
                continuous,
                response,
            )?);
        }
    }

    log::info!(
        "Prepared stacked data: {} imputations x {} replications, {} predictors.",
        imputations,
        replications,
        predictors.len()
    );

    Ok(StackedData {
        frames,
        imputations,
        replications,
        predictor_names: predictors.to_vec(),
    })
}

/// Internal module for shared loading and validation logic.
mod internal {
    use super::*;

    pub(super) fn read_tsv(path: &str) -> Result<DataFrame, DataError> {
        log::info!("Loading data from '{path}'");
        let df = CsvReader::new(File::open(Path::new(path))?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
            )
            .finish()?;
        Ok(df)
    }

    pub(super) fn check_predictor_names(predictors: &[String]) -> Result<(), DataError> {
        if predictors.is_empty() {
            return Err(DataError::NoPredictors);
        }
        let mut seen = HashSet::new();
        for name in predictors {
            if !seen.insert(name.as_str()) {
                return Err(DataError::DuplicatePredictor(name.clone()));
            }
        }
        Ok(())
    }

    pub(super) fn check_columns_exist(
        df: &DataFrame,
        response: &str,
        predictors: &[String],
        identifiers: &[&str],
    ) -> Result<(), DataError> {
        let present: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let mut required: Vec<&str> = Vec::with_capacity(predictors.len() + 1 + identifiers.len());
        required.push(response);
        required.extend(predictors.iter().map(|s| s.as_str()));
        required.extend_from_slice(identifiers);
        for name in required {
            if !present.contains(name) {
                return Err(DataError::ColumnNotFound(name.to_string()));
            }
        }
        Ok(())
    }

    pub(super) fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<f64>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };
        if casted.null_count() > 0 {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        if values.iter().any(|&v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }

    /// Reads an identifier column as 1-based integers, rejecting anything
    /// fractional or outside 1..=max.
    pub(super) fn extract_identifier_column(
        df: &DataFrame,
        column_name: &str,
        max: usize,
    ) -> Result<Vec<usize>, DataError> {
        let raw = extract_numeric_column(df, column_name)?;
        raw.into_iter()
            .map(|v| {
                if v.fract() != 0.0 || v < 1.0 || v > max as f64 {
                    Err(DataError::IdentifierOutOfRange {
                        column: column_name.to_string(),
                        value: v,
                        max,
                    })
                } else {
                    Ok(v as usize)
                }
            })
            .collect()
    }

    pub(super) fn build_frame(
        y: Vec<f64>,
        columns: &[Vec<f64>],
        predictor_names: &[String],
        continuous: bool,
        response_name: &str,
    ) -> Result<ModelFrame, DataError> {
        let n = y.len();
        if n == 0 {
            return Err(DataError::EmptyData);
        }
        if !continuous {
            for (row, &value) in y.iter().enumerate() {
                if value != 0.0 && value != 1.0 {
                    return Err(DataError::ResponseNotBinary {
                        column: response_name.to_string(),
                        value,
                        row: row + 1,
                    });
                }
            }
        }

        let p = columns.len();
        let mut x = Array2::<f64>::ones((n, p + 1));
        for (j, column) in columns.iter().enumerate() {
            if column.len() != n {
                return Err(DataError::ColumnLengthMismatch {
                    column: predictor_names[j].clone(),
                    expected: n,
                    found: column.len(),
                });
            }
            for (i, &value) in column.iter().enumerate() {
                x[[i, j + 1]] = value;
            }
        }

        Ok(ModelFrame {
            x,
            y: Array1::from_vec(y),
            predictor_names: predictor_names.to_vec(),
            continuous,
        })
    }
}
