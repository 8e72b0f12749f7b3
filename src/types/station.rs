//! Data structures for the upstream weather-station metadata, including
//! inventory, location, and identifiers, plus the `rstar` implementations
//! needed to index stations spatially.

use chrono::NaiveDate;
use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single weather station and its associated metadata.
///
/// Field names mirror the upstream bulk metadata JSON; the struct must stay
/// deserialization-compatible with that feed.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// The unique station identifier (e.g., "10637").
    pub id: String,
    /// Country code where the station is located (e.g., "NL", "DE").
    pub country: String,
    /// Region code (state, province, etc.), if available.
    pub region: Option<String>,
    /// IANA timezone name for the station's location, if available.
    pub timezone: Option<String>,
    /// Station names keyed by language code (e.g., {"en": "Schiphol"}).
    pub name: HashMap<String, String>,
    /// Other known identifiers for the station.
    pub identifiers: Identifiers,
    /// Geographical location details (latitude, longitude, elevation).
    pub location: StationLocation,
    /// Reported data-availability periods per feed frequency.
    pub inventory: Inventory,
}

/// Reported data-availability ranges for a station.
///
/// Only the hourly range is consulted by this crate, but the other fields
/// must remain present so the upstream JSON parses. Gaps can exist within
/// any reported range.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Inventory {
    pub daily: DateRange,
    /// Reported start and end dates for hourly observations.
    pub hourly: DateRange,
    pub model: DateRange,
    pub monthly: YearRange,
    pub normals: YearRange,
}

/// A date range with optional start and end dates.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// A year range with optional start and end years.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

/// Alternative identifiers that might be associated with a station.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Identifiers {
    /// National station identifier, if available.
    pub national: Option<String>,
    /// World Meteorological Organization identifier, if available.
    pub wmo: Option<String>,
    /// ICAO airport code, if the station is at an airport.
    pub icao: Option<String>,
}

/// Geographical location of a weather station.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StationLocation {
    /// Latitude in decimal degrees (positive for North).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East).
    pub longitude: f64,
    /// Elevation above sea level in meters, if available.
    pub elevation: Option<i32>,
}

impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.latitude, self.location.longitude])
    }
}

impl PointDistance for Station {
    /// Squared Euclidean distance in (lat, lon) space. An approximation that
    /// is fine for nearest-neighbor candidate ordering; the final distance
    /// filter uses haversine.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.location.latitude - point[0];
        let dy = self.location.longitude - point[1];
        dx * dx + dy * dy
    }
}
