//! Cleaning and scaling of collected dataframes: missing-value imputation,
//! IQR-based outlier removal, and feature standardization.
//!
//! Nothing here assumes weather data; any dataframe with numeric columns
//! works. Non-numeric columns (like a `datetime` index) pass through every
//! step untouched.

mod scaler;

pub use scaler::StandardScaler;

use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Column '{0}' not found in dataframe")]
    ColumnNotFound(String),

    #[error("Dataframe operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// How per-column IQR bounds are computed when removing outliers from
/// multiple columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlierPolicy {
    /// Columns are filtered one after another; each column's quartiles are
    /// computed on the rows that survived the previous columns. Removing an
    /// extreme row can therefore tighten the bounds for later columns.
    #[default]
    Sequential,
    /// All quartiles are computed on the input dataframe, then the combined
    /// row mask is applied once. Order-independent.
    Simultaneous,
}

/// Stateful preprocessor that cleans a dataframe and remembers fitted
/// scalers so they can be reapplied to later data.
#[derive(Debug, Default)]
pub struct DataPreprocessor {
    scalers: HashMap<String, StandardScaler>,
}

impl DataPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills missing values in every numeric column: interior gaps are
    /// linearly interpolated, runs after the last observation repeat it, and
    /// anything still missing (leading gaps, all-null columns) becomes `0`.
    ///
    /// `[1, null, 3, null, null]` becomes `[1, 2, 3, 3, 3]`;
    /// `[null, 2]` becomes `[0, 2]`.
    pub fn handle_missing_values(&self, df: DataFrame) -> Result<DataFrame, PreprocessError> {
        let numeric = numeric_column_names(&df);
        if numeric.is_empty() {
            return Ok(df);
        }

        let exprs: Vec<Expr> = numeric
            .iter()
            .map(|name| {
                col(name.as_str())
                    .interpolate(InterpolationMethod::Linear)
                    .forward_fill(None)
                    .fill_null(lit(0.0))
            })
            .collect();

        Ok(df.lazy().with_columns(exprs).collect()?)
    }

    /// Removes rows whose value in any numeric column falls outside
    /// `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]` for that column.
    ///
    /// Rows with a null in a checked column are removed as well, so this is
    /// intended to run after [`handle_missing_values`]. All-null columns are
    /// skipped entirely; no bounds can be computed for them.
    ///
    /// [`handle_missing_values`]: DataPreprocessor::handle_missing_values
    pub fn detect_and_remove_outliers(
        &self,
        df: DataFrame,
        policy: OutlierPolicy,
    ) -> Result<DataFrame, PreprocessError> {
        let numeric = numeric_column_names(&df);

        match policy {
            OutlierPolicy::Sequential => {
                let mut df = df;
                for name in &numeric {
                    let series = df
                        .column(name.as_str())?
                        .as_materialized_series()
                        .cast(&DataType::Float64)?;
                    let Some((lower, upper)) = iqr_bounds(&series)? else {
                        continue;
                    };
                    let values = series.f64()?;
                    let mask = values.gt_eq(lower) & values.lt_eq(upper);
                    df = df.filter(&mask)?;
                }
                Ok(df)
            }
            OutlierPolicy::Simultaneous => {
                let mut combined: Option<BooleanChunked> = None;
                for name in &numeric {
                    let series = df
                        .column(name.as_str())?
                        .as_materialized_series()
                        .cast(&DataType::Float64)?;
                    let Some((lower, upper)) = iqr_bounds(&series)? else {
                        continue;
                    };
                    let values = series.f64()?;
                    let mask = values.gt_eq(lower) & values.lt_eq(upper);
                    combined = Some(match combined {
                        Some(acc) => acc & mask,
                        None => mask,
                    });
                }
                match combined {
                    Some(mask) => Ok(df.filter(&mask)?),
                    None => Ok(df),
                }
            }
        }
    }

    /// Fits a [`StandardScaler`] on the given columns, applies it, and stores
    /// it under the `"standard"` key for later reuse via [`scaler`].
    ///
    /// [`scaler`]: DataPreprocessor::scaler
    pub fn scale_features(
        &mut self,
        df: DataFrame,
        columns: &[&str],
    ) -> Result<DataFrame, PreprocessError> {
        let scaler = StandardScaler::fit(&df, columns)?;
        let scaled = scaler.transform(df)?;
        self.scalers.insert("standard".to_string(), scaler);
        Ok(scaled)
    }

    /// A previously fitted scaler, e.g. `"standard"` after
    /// [`scale_features`](DataPreprocessor::scale_features).
    pub fn scaler(&self, key: &str) -> Option<&StandardScaler> {
        self.scalers.get(key)
    }
}

fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|column| column.dtype().is_primitive_numeric())
        .map(|column| column.name().to_string())
        .collect()
}

/// The `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]` bounds for one column, with quartiles
/// linearly interpolated. `None` when the column has no non-null values.
fn iqr_bounds(series: &Series) -> Result<Option<(f64, f64)>, PreprocessError> {
    if series.len() == series.null_count() {
        return Ok(None);
    }
    let values = series.f64()?;
    let (Some(q1), Some(q3)) = (
        values.quantile(0.25, QuantileMethod::Linear)?,
        values.quantile(0.75, QuantileMethod::Linear)?,
    ) else {
        return Ok(None);
    };
    let iqr = q3 - q1;
    Ok(Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr)))
}
