use crate::preprocess::PreprocessError;
use crate::stations::error::LocateStationError;
use crate::weather_data::error::WeatherDataError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherPrepError {
    #[error(transparent)]
    WeatherData(#[from] WeatherDataError),

    #[error(transparent)]
    LocateStation(#[from] LocateStationError),

    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("Polars operation failed")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),

    #[error("No weather station found within {radius} km of ({lat}, {lon})")]
    NoStationWithinRadius { radius: f64, lat: f64, lon: f64 },

    #[error("No hourly data available from any of the {stations_tried} stations within {radius} km of ({lat}, {lon})")]
    NoDataFoundForNearbyStations {
        radius: f64,
        lat: f64,
        lon: f64,
        stations_tried: usize,
        #[source]
        last_error: Option<Box<WeatherPrepError>>,
    },

    #[error("Fetching hourly data for location '{name}' failed after {attempts} attempt(s)")]
    LocationFetch {
        name: String,
        attempts: u32,
        #[source]
        source: Box<WeatherPrepError>,
    },

    #[error("Merged table is missing the 'datetime' column ({locations} location(s) requested)")]
    MergeIntegrity { locations: usize },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}
