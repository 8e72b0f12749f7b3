//! Collects hourly observations for a set of named locations over a date
//! range and merges them into one wide, time-indexed table.

use crate::client::{LatLon, WeatherClient};
use crate::error::WeatherPrepError;
use crate::types::hourly_frame::{HourlyLazyFrame, DATETIME_COLUMN};
use crate::types::inventory::RequiredData;
use bon::bon;
use chrono::NaiveDate;
use log::warn;
use polars::prelude::*;
use std::time::Duration;

/// The observation variables collected per location, in output column order.
pub const TRACKED_FIELDS: [&str; 4] = ["temp", "rhum", "wspd", "wdir"];

const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// A location whose hourly data could not be fetched.
#[derive(Debug)]
pub struct FailedLocation {
    pub name: String,
    pub error: WeatherPrepError,
}

/// Result of a collection run: the merged table plus any locations that
/// failed (empty unless `allow_partial` was set).
#[derive(Debug)]
pub struct HourlyCollection {
    /// One `datetime` column plus four columns per successfully fetched
    /// location, named `<location>_<field>`.
    pub data: DataFrame,
    pub failed: Vec<FailedLocation>,
}

/// Fetches hourly weather per named location and outer-joins everything on
/// the `datetime` column.
pub struct HourlyWeatherCollector<'a> {
    client: &'a WeatherClient,
}

#[bon]
impl<'a> HourlyWeatherCollector<'a> {
    pub fn new(client: &'a WeatherClient) -> Self {
        Self { client }
    }

    /// Collects hourly observations for every location over `[start, end]`
    /// (both calendar dates inclusive; the end date is a full day).
    ///
    /// Locations are processed in input order, which determines output column
    /// order only. Per location the nearest station's data is fetched (with
    /// retry and exponential backoff), restricted to the date window, padded
    /// with all-null columns for tracked fields the source omits, and renamed
    /// with the location prefix. The per-location tables are then full-outer
    ///-joined on `datetime`: the output covers the union of timestamps, with
    /// nulls where a location has no observation for an hour.
    ///
    /// # Arguments
    ///
    /// * `.locations(Vec<(String, LatLon)>)`: **Required.** Named points to
    ///   collect, e.g. `("istanbul".into(), LatLon(41.0082, 28.9784))`.
    /// * `.start(NaiveDate)` / `.end(NaiveDate)`: **Required.** Inclusive
    ///   date range.
    /// * `.max_distance_km(f64)`: Optional station search radius per
    ///   location, defaults to `50.0`.
    /// * `.station_limit(usize)`: Optional candidate stations to try per
    ///   location, defaults to `1`.
    /// * `.required_data(RequiredData)`: Optional inventory filter for
    ///   candidate stations.
    /// * `.fetch_attempts(u32)`: Optional attempts per location, defaults
    ///   to `3`.
    /// * `.retry_base_delay(Duration)`: Optional backoff base, defaults to
    ///   500ms (doubled per attempt).
    /// * `.allow_partial(bool)`: Optional, defaults to `false`. When set,
    ///   locations whose fetch ultimately fails are reported in
    ///   [`HourlyCollection::failed`] instead of aborting the run.
    ///
    /// # Errors
    ///
    /// [`WeatherPrepError::InvalidDateRange`] when `start > end`;
    /// [`WeatherPrepError::LocationFetch`] when a location fails and partial
    /// results are not allowed; [`WeatherPrepError::MergeIntegrity`] when no
    /// `datetime` column can be produced (e.g. an empty location set).
    #[builder]
    pub async fn collect(
        &self,
        locations: Vec<(String, LatLon)>,
        start: NaiveDate,
        end: NaiveDate,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
        required_data: Option<RequiredData>,
        fetch_attempts: Option<u32>,
        retry_base_delay: Option<Duration>,
        allow_partial: Option<bool>,
    ) -> Result<HourlyCollection, WeatherPrepError> {
        if start > end {
            return Err(WeatherPrepError::InvalidDateRange { start, end });
        }
        let fetch_attempts = fetch_attempts.unwrap_or(DEFAULT_FETCH_ATTEMPTS).max(1);
        let retry_base_delay = retry_base_delay.unwrap_or(DEFAULT_RETRY_BASE_DELAY);
        let allow_partial = allow_partial.unwrap_or(false);

        let location_count = locations.len();
        let mut frames: Vec<DataFrame> = Vec::with_capacity(location_count);
        let mut failed: Vec<FailedLocation> = Vec::new();

        for (name, coordinate) in locations {
            let fetched = self
                .fetch_with_retry(
                    &name,
                    coordinate,
                    max_distance_km,
                    station_limit,
                    required_data,
                    fetch_attempts,
                    retry_base_delay,
                )
                .await;

            match fetched {
                Ok(hourly) => {
                    let windowed = hourly.get_date_range(start, end).frame.collect()?;
                    frames.push(normalize_location_frame(windowed, &name)?);
                }
                Err(error) if allow_partial => {
                    warn!("Skipping location '{name}': {error}");
                    failed.push(FailedLocation { name, error });
                }
                Err(error) => return Err(error),
            }
        }

        let data = merge_location_frames(frames, location_count)?;
        Ok(HourlyCollection { data, failed })
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_with_retry(
        &self,
        name: &str,
        coordinate: LatLon,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
        required_data: Option<RequiredData>,
        fetch_attempts: u32,
        retry_base_delay: Duration,
    ) -> Result<HourlyLazyFrame, WeatherPrepError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .hourly_from_location()
                .location(coordinate)
                .maybe_max_distance_km(max_distance_km)
                .maybe_station_limit(station_limit)
                .maybe_required_data(required_data)
                .call()
                .await;

            match result {
                Ok(frame) => return Ok(frame),
                Err(error) if attempt < fetch_attempts && is_retryable(&error) => {
                    let delay = retry_base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        "Fetch attempt {attempt}/{fetch_attempts} for location '{name}' failed \
                         ({error}), retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(WeatherPrepError::LocationFetch {
                        name: name.to_string(),
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
            }
        }
    }
}

/// Transient failures worth retrying; a missing station within the radius is
/// deterministic and retried downloads cannot fix it.
fn is_retryable(error: &WeatherPrepError) -> bool {
    !matches!(error, WeatherPrepError::NoStationWithinRadius { .. })
}

/// Normalizes one location's raw hourly frame into the collector's
/// per-location shape: every tracked field present (all-null Float64 when the
/// source omits it), exactly `datetime` plus the four tracked columns, each
/// field prefixed with the location name.
pub(crate) fn normalize_location_frame(
    mut df: DataFrame,
    location_name: &str,
) -> Result<DataFrame, WeatherPrepError> {
    for field in TRACKED_FIELDS {
        if df.column(field).is_err() {
            df.with_column(Column::full_null(
                field.into(),
                df.height(),
                &DataType::Float64,
            ))?;
        }
    }

    let mut selection: Vec<&str> = vec![DATETIME_COLUMN];
    selection.extend(TRACKED_FIELDS);
    let mut df = df.select(selection)?;

    for field in TRACKED_FIELDS {
        df.rename(field, format!("{location_name}_{field}").into())?;
    }
    Ok(df)
}

/// Outer-joins the per-location frames on `datetime` and normalizes the
/// result: rows are the union of timestamps across locations, sorted, and the
/// `datetime` column is guaranteed present with a Datetime dtype.
pub(crate) fn merge_location_frames(
    frames: Vec<DataFrame>,
    location_count: usize,
) -> Result<DataFrame, WeatherPrepError> {
    let mut iter = frames.into_iter();
    let Some(first) = iter.next() else {
        return Err(WeatherPrepError::MergeIntegrity {
            locations: location_count,
        });
    };

    let mut merged = first.lazy();
    for frame in iter {
        merged = merged.join(
            frame.lazy(),
            [col(DATETIME_COLUMN)],
            [col(DATETIME_COLUMN)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }

    let df = merged
        .sort([DATETIME_COLUMN], SortMultipleOptions::default())
        .collect()?;
    finalize_datetime(df, location_count)
}

/// Post-merge normalization: a leftover `time` column is renamed to
/// `datetime`, its presence is verified, and it is re-cast to a Datetime
/// dtype in case the source delivered strings.
pub(crate) fn finalize_datetime(
    mut df: DataFrame,
    location_count: usize,
) -> Result<DataFrame, WeatherPrepError> {
    let has_datetime = df.column(DATETIME_COLUMN).is_ok();
    if !has_datetime && df.column("time").is_ok() {
        df.rename("time", DATETIME_COLUMN.into())?;
    }
    if df.column(DATETIME_COLUMN).is_err() {
        return Err(WeatherPrepError::MergeIntegrity {
            locations: location_count,
        });
    }

    let datetime = df
        .column(DATETIME_COLUMN)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    df.with_column(datetime)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn hours(day: u32, range: std::ops::Range<i64>) -> Vec<NaiveDateTime> {
        range
            .map(|h| {
                NaiveDate::from_ymd_opt(2023, 5, day)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    + chrono::Duration::hours(h)
            })
            .collect()
    }

    fn raw_frame(datetimes: Vec<NaiveDateTime>, fields: &[(&str, f64)]) -> DataFrame {
        let mut columns: Vec<Column> =
            vec![Series::new(DATETIME_COLUMN.into(), datetimes.clone()).into()];
        for (name, base) in fields {
            let values: Vec<f64> = (0..datetimes.len()).map(|i| base + i as f64).collect();
            columns.push(Series::new((*name).into(), values).into());
        }
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn normalize_inserts_missing_fields_as_null_columns() {
        // Source only delivered temp and rhum, plus an untracked extra.
        let df = raw_frame(hours(1, 0..3), &[("temp", 10.0), ("rhum", 60.0), ("prcp", 0.0)]);
        let normalized = normalize_location_frame(df, "istanbul").unwrap();

        assert_eq!(
            normalized.get_column_names(),
            [
                "datetime",
                "istanbul_temp",
                "istanbul_rhum",
                "istanbul_wspd",
                "istanbul_wdir"
            ]
        );
        let wspd = normalized.column("istanbul_wspd").unwrap();
        assert_eq!(wspd.null_count(), 3);
        assert_eq!(wspd.dtype(), &DataType::Float64);
    }

    #[test]
    fn merge_covers_union_of_disjoint_timestamps() {
        // Location A has hours 0-2, location B has hours 1-3.
        let a = normalize_location_frame(raw_frame(hours(1, 0..3), &[("temp", 10.0)]), "a").unwrap();
        let b = normalize_location_frame(raw_frame(hours(1, 1..4), &[("temp", 20.0)]), "b").unwrap();

        let merged = merge_location_frames(vec![a, b], 2).unwrap();

        // Union of timestamps: hours 0 through 3.
        assert_eq!(merged.height(), 4);
        // 1 datetime column + 4 per location.
        assert_eq!(merged.width(), 1 + 4 * 2);

        // B has no observation at hour 0, A none at hour 3.
        let b_temp = merged.column("b_temp").unwrap();
        assert!(b_temp.get(0).unwrap().is_null());
        let a_temp = merged.column("a_temp").unwrap();
        assert!(a_temp.get(3).unwrap().is_null());

        // Sorted by datetime after the outer join.
        let dt = merged.column(DATETIME_COLUMN).unwrap();
        assert!(matches!(
            dt.dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));
    }

    #[test]
    fn merge_with_no_frames_is_a_merge_integrity_error() {
        let err = merge_location_frames(vec![], 0).unwrap_err();
        assert!(matches!(
            err,
            WeatherPrepError::MergeIntegrity { locations: 0 }
        ));
    }

    #[test]
    fn column_count_matches_location_count() {
        let frames: Vec<DataFrame> = ["x", "y", "z"]
            .iter()
            .map(|name| {
                normalize_location_frame(raw_frame(hours(1, 0..5), &[("temp", 0.0)]), name).unwrap()
            })
            .collect();
        let merged = merge_location_frames(frames, 3).unwrap();
        assert_eq!(merged.width(), 1 + 4 * 3);
        assert_eq!(merged.height(), 5);
    }

    #[test]
    fn finalize_renames_time_and_reparses_strings() {
        // Defensive path: the source delivered a string-typed `time` column.
        let df = DataFrame::new(vec![
            Series::new(
                "time".into(),
                &["2023-05-01 00:00:00", "2023-05-01 01:00:00"],
            )
            .into(),
            Series::new("a_temp".into(), &[1.0, 2.0]).into(),
        ])
        .unwrap();

        let fixed = finalize_datetime(df, 1).unwrap();
        let dt = fixed.column(DATETIME_COLUMN).unwrap();
        assert!(matches!(
            dt.dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));
    }

    #[test]
    fn finalize_without_any_timestamp_column_fails() {
        let df = DataFrame::new(vec![Series::new("a_temp".into(), &[1.0]).into()]).unwrap();
        let err = finalize_datetime(df, 1).unwrap_err();
        assert!(matches!(err, WeatherPrepError::MergeIntegrity { .. }));
    }
}
