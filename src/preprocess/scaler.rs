//! Standardization of selected numeric columns.

use crate::preprocess::PreprocessError;
use polars::prelude::*;

/// A fitted standardization scaler: per-column mean and population standard
/// deviation, applied as `(x - mean) / std`.
///
/// Fitting and transforming are separate steps so a scaler fitted on training
/// data can be reapplied to later data with the same parameters.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Computes mean and population standard deviation (ddof = 0) for each of
    /// the given columns.
    ///
    /// A column with zero or undefined spread gets a standard deviation of
    /// `1.0` so transforming it centers the values without dividing by zero.
    ///
    /// # Errors
    ///
    /// [`PreprocessError::ColumnNotFound`] if any requested column is absent.
    pub fn fit(df: &DataFrame, columns: &[&str]) -> Result<Self, PreprocessError> {
        let mut means = Vec::with_capacity(columns.len());
        let mut stds = Vec::with_capacity(columns.len());

        for &name in columns {
            let column = df
                .column(name)
                .map_err(|_| PreprocessError::ColumnNotFound(name.to_string()))?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;

            means.push(series.mean().unwrap_or(0.0));
            let std = series.std(0).unwrap_or(0.0);
            stds.push(if std.is_finite() && std > 0.0 { std } else { 1.0 });
        }

        Ok(Self {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            means,
            stds,
        })
    }

    /// Replaces each fitted column with its standardized values, leaving all
    /// other columns untouched.
    pub fn transform(&self, df: DataFrame) -> Result<DataFrame, PreprocessError> {
        for name in &self.columns {
            if df.column(name).is_err() {
                return Err(PreprocessError::ColumnNotFound(name.clone()));
            }
        }

        let exprs: Vec<Expr> = self
            .columns
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(name, (&mean, &std))| {
                ((col(name.as_str()).cast(DataType::Float64) - lit(mean)) / lit(std))
                    .alias(name.as_str())
            })
            .collect();

        Ok(df.lazy().with_columns(exprs).collect()?)
    }

    /// The fitted parameters as `(column, mean, std)` triples.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.columns
            .iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(name, (&mean, &std))| (name.as_str(), mean, std))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(values: &[f64]) -> DataFrame {
        DataFrame::new(vec![Series::new("x".into(), values).into()]).unwrap()
    }

    fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn fit_uses_population_std() {
        let scaler = StandardScaler::fit(&frame(&[1.0, 2.0, 3.0]), &["x"]).unwrap();
        let (_, mean, std) = scaler.parameters().next().unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
        // sqrt(2/3), not the sample std sqrt(1).
        assert!((std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn transform_standardizes_in_place() {
        let scaler = StandardScaler::fit(&frame(&[1.0, 2.0, 3.0]), &["x"]).unwrap();
        let scaled = scaler.transform(frame(&[1.0, 2.0, 3.0])).unwrap();

        let values = column_values(&scaled, "x");
        let expected = 1.0 / (2.0f64 / 3.0).sqrt();
        assert!((values[0] + expected).abs() < 1e-12);
        assert!(values[1].abs() < 1e-12);
        assert!((values[2] - expected).abs() < 1e-12);
    }

    #[test]
    fn fitted_parameters_apply_to_new_data() {
        let scaler = StandardScaler::fit(&frame(&[1.0, 2.0, 3.0]), &["x"]).unwrap();
        let scaled = scaler.transform(frame(&[4.0])).unwrap();

        let values = column_values(&scaled, "x");
        let expected = 2.0 / (2.0f64 / 3.0).sqrt();
        assert!((values[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn constant_column_centers_without_dividing_by_zero() {
        let scaler = StandardScaler::fit(&frame(&[5.0, 5.0, 5.0]), &["x"]).unwrap();
        let scaled = scaler.transform(frame(&[5.0, 5.0, 5.0])).unwrap();

        for value in column_values(&scaled, "x") {
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = StandardScaler::fit(&frame(&[1.0]), &["missing"]).unwrap_err();
        assert!(matches!(err, PreprocessError::ColumnNotFound(name) if name == "missing"));
    }
}
