//! Lazy wrapper over hourly observation data for a single station.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{col, lit, Expr, LazyFrame};

/// Column names of the raw hourly CSV feed, in file order. The feed ships no
/// header row, so these are assigned after parsing.
pub const HOURLY_SCHEMA_COLUMNS: [&str; 13] = [
    "date", "hour", "temp", "dwpt", "rhum", "prcp", "snow", "wdir", "wspd", "wpgt", "pres", "tsun",
    "coco",
];

/// Name of the derived timestamp column added by the loader.
pub const DATETIME_COLUMN: &str = "datetime";

/// A wrapper around a Polars `LazyFrame` holding hourly weather observations.
///
/// The frame carries the raw feed columns plus a derived `datetime` column
/// (timezone-naive UTC, millisecond precision) that all range filtering is
/// based on. Instances are obtained via [`crate::WeatherClient`].
#[derive(Clone)]
pub struct HourlyLazyFrame {
    /// The underlying Polars LazyFrame containing the hourly data.
    pub frame: LazyFrame,
}

impl HourlyLazyFrame {
    pub fn new(frame: LazyFrame) -> Self {
        Self { frame }
    }

    /// Applies an arbitrary Polars predicate, returning a new lazy frame.
    pub fn filter(&self, predicate: Expr) -> HourlyLazyFrame {
        HourlyLazyFrame::new(self.frame.clone().filter(predicate))
    }

    /// Restricts the data to `[start, end]`, both bounds inclusive.
    pub fn get_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> HourlyLazyFrame {
        self.filter(
            col(DATETIME_COLUMN)
                .gt_eq(lit(start))
                .and(col(DATETIME_COLUMN).lt_eq(lit(end))),
        )
    }

    /// Restricts the data to the full days `[start, end]`, i.e. from midnight
    /// on `start` through 23:59:59 on `end`.
    pub fn get_date_range(&self, start: NaiveDate, end: NaiveDate) -> HourlyLazyFrame {
        let start_dt = start.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let end_dt = end.and_hms_opt(23, 59, 59).expect("end of day is valid");
        self.get_range(start_dt, end_dt)
    }
}
