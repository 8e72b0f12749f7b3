//! The entry point for fetching hourly weather data, either by station ID or
//! by geographical coordinates.

use crate::error::WeatherPrepError;
use crate::stations::locate_station::StationLocator;
use crate::types::hourly_frame::HourlyLazyFrame;
use crate::types::inventory::RequiredData;
use crate::types::station::Station;
use crate::utils::{default_cache_dir, ensure_cache_dir_exists};
use crate::weather_data::frame_fetcher::FrameFetcher;
use bon::bon;
use std::path::PathBuf;

/// A geographical coordinate: latitude first, longitude second, both `f64`.
///
/// # Examples
///
/// ```
/// use weatherprep::LatLon;
///
/// let berlin_center = LatLon(52.5200, 13.4050);
/// assert_eq!(berlin_center.0, 52.5200); // Latitude
/// assert_eq!(berlin_center.1, 13.4050); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// Client for the hourly weather data source.
///
/// Handles station lookup by coordinate and fetching per-station hourly data
/// as Polars `LazyFrame`s, with a local download cache to speed up
/// subsequent requests. Create one with [`WeatherClient::new()`] (default
/// cache directory) or [`WeatherClient::with_cache_folder()`].
pub struct WeatherClient {
    fetcher: FrameFetcher,
    station_locator: StationLocator,
}

#[bon]
impl WeatherClient {
    /// Creates a client with a specific cache directory, creating the
    /// directory if needed and loading the station index into memory.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherPrepError::CacheDirCreation`] if the directory cannot
    /// be created, or a [`WeatherPrepError::LocateStation`] variant if the
    /// station metadata cannot be loaded.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, WeatherPrepError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| WeatherPrepError::CacheDirCreation(cache_folder.clone(), e))?;
        Ok(Self {
            station_locator: StationLocator::new(&cache_folder).await?,
            fetcher: FrameFetcher::new(&cache_folder),
        })
    }

    /// Creates a client using the default OS cache directory (resolved via
    /// the `dirs` crate).
    pub async fn new() -> Result<Self, WeatherPrepError> {
        let cache_folder = default_cache_dir().map_err(WeatherPrepError::CacheDirResolution)?;
        Self::with_cache_folder(cache_folder).await
    }

    /// Finds weather stations near a location, closest first.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** Search center.
    /// * `.required_data(RequiredData)`: Optional hourly inventory filter.
    /// * `.max_distance_km(f64)`: Optional search radius, defaults to `50.0`.
    /// * `.station_limit(usize)`: Optional result cap, defaults to `5`.
    #[builder]
    pub async fn find_stations(
        &self,
        location: LatLon,
        required_data: Option<RequiredData>,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
    ) -> Result<Vec<Station>, WeatherPrepError> {
        let max_distance_km = max_distance_km.unwrap_or(50.0);
        let station_limit = station_limit.unwrap_or(5);

        let stations_with_distance = self.station_locator.query(
            location.0,
            location.1,
            station_limit,
            max_distance_km,
            required_data,
        );

        Ok(stations_with_distance
            .into_iter()
            .map(|(station, _distance)| station)
            .collect())
    }

    /// Fetches the full hourly history for a specific station ID.
    ///
    /// Checks the local cache first; otherwise downloads from the bulk data
    /// servers and caches the result. The returned [`HourlyLazyFrame`] can be
    /// filtered by datetime range before collecting.
    #[builder]
    pub async fn hourly_from_station(
        &self,
        station: &str,
    ) -> Result<HourlyLazyFrame, WeatherPrepError> {
        let frame = self.fetcher.hourly_lazyframe(station).await?;
        Ok(HourlyLazyFrame::new(frame))
    }

    /// Fetches hourly data for the closest available station near a
    /// coordinate.
    ///
    /// Candidate stations are tried closest-first; the data of the first
    /// successful fetch is returned.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** Search center.
    /// * `.max_distance_km(f64)`: Optional search radius, defaults to `50.0`.
    /// * `.station_limit(usize)`: Optional number of candidates to try,
    ///   defaults to `1`. Raising it helps when the closest station has no
    ///   downloadable data.
    /// * `.required_data(RequiredData)`: Optional hourly inventory filter
    ///   applied to candidates before any download.
    ///
    /// # Errors
    ///
    /// [`WeatherPrepError::NoStationWithinRadius`] when the search finds no
    /// candidates, [`WeatherPrepError::NoDataFoundForNearbyStations`] when
    /// every candidate's fetch fails (carrying the last fetch error).
    #[builder]
    pub async fn hourly_from_location(
        &self,
        location: LatLon,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
        required_data: Option<RequiredData>,
    ) -> Result<HourlyLazyFrame, WeatherPrepError> {
        let max_distance_km = max_distance_km.unwrap_or(50.0);
        let station_limit = station_limit.unwrap_or(1);

        let stations = self.station_locator.query(
            location.0,
            location.1,
            station_limit,
            max_distance_km,
            required_data,
        );

        if stations.is_empty() {
            return Err(WeatherPrepError::NoStationWithinRadius {
                radius: max_distance_km,
                lat: location.0,
                lon: location.1,
            });
        }

        let mut last_error: Option<WeatherPrepError> = None;

        for (station, _) in stations.iter() {
            match self.fetcher.hourly_lazyframe(&station.id).await {
                Ok(lazy_frame) => {
                    return Ok(HourlyLazyFrame::new(lazy_frame));
                }
                Err(e) => {
                    last_error = Some(WeatherPrepError::from(e));
                }
            }
        }

        Err(WeatherPrepError::NoDataFoundForNearbyStations {
            radius: max_distance_km,
            lat: location.0,
            lon: location.1,
            stations_tried: stations.len(),
            last_error: last_error.map(Box::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hourly_frame::HOURLY_SCHEMA_COLUMNS;

    // These tests exercise the live bulk data servers and the real station
    // metadata feed, so they are opt-in.

    #[tokio::test]
    #[ignore = "requires network access to the bulk weather servers"]
    async fn hourly_from_station_has_expected_schema() -> Result<(), WeatherPrepError> {
        let cache = tempfile::tempdir().unwrap();
        let client = WeatherClient::with_cache_folder(cache.path().to_path_buf()).await?;

        let frame = client
            .hourly_from_station()
            .station("10637")
            .call()
            .await?
            .frame
            .collect()?;

        assert_eq!(frame.width(), HOURLY_SCHEMA_COLUMNS.len() + 1);
        assert!(frame.height() > 0);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires network access to the bulk weather servers"]
    async fn find_stations_near_berlin() -> Result<(), WeatherPrepError> {
        let cache = tempfile::tempdir().unwrap();
        let client = WeatherClient::with_cache_folder(cache.path().to_path_buf()).await?;

        let stations = client
            .find_stations()
            .location(LatLon(52.52, 13.40))
            .call()
            .await?;

        assert!(!stations.is_empty());
        assert!(stations.len() <= 5);
        Ok(())
    }
}
