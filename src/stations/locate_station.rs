//! Spatial lookup of weather stations by coordinate, backed by an R-tree
//! built from the upstream station metadata feed.

use crate::stations::error::LocateStationError;
use crate::types::inventory::RequiredData;
use crate::types::station::Station;
use async_compression::tokio::bufread::GzipDecoder;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::NaiveDate;
use futures_util::TryStreamExt;
use haversine::{distance, Location as HaversineLocation, Units};
use log::info;
use ordered_float::OrderedFloat;
use reqwest::Client;
use rstar::RTree;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::path::Path;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const STATIONS_URL: &str = "https://bulk.meteostat.net/v2/stations/lite.json.gz";
const BINCODE_CACHE_FILE_NAME: &str = "stations_lite.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Finds the stations nearest to a coordinate, optionally filtered by
/// reported hourly inventory coverage.
#[derive(Debug, Clone)]
pub struct StationLocator {
    rtree: RTree<Station>,
}

// Helper struct for BinaryHeap ordering (compares distance only).
struct StationCandidate<'a> {
    distance_km: OrderedFloat<f64>,
    station: &'a Station,
}
impl PartialEq for StationCandidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance_km == other.distance_km
    }
}
impl Eq for StationCandidate<'_> {}
impl PartialOrd for StationCandidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for StationCandidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km.cmp(&other.distance_km)
    }
}

impl StationLocator {
    /// Loads the station index, downloading and caching the metadata feed on
    /// first use.
    pub async fn new(cache_dir: &Path) -> Result<Self, LocateStationError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);

        let stations: Vec<Station> = if cache_file.exists() {
            let path_clone = cache_file.clone();
            tokio::task::spawn_blocking(move || Self::get_cached_stations(&path_clone)).await??
        } else {
            info!("Station cache not found, fetching from {}", STATIONS_URL);
            let stations = Self::fetch_stations().await?;
            Self::cache_stations(stations.clone(), &cache_file).await?;
            stations
        };

        Ok(Self::from_stations(stations))
    }

    /// Builds a locator from an already-loaded station list.
    pub(crate) fn from_stations(stations: Vec<Station>) -> Self {
        StationLocator {
            rtree: RTree::bulk_load(stations),
        }
    }

    fn get_cached_stations(cache_path: &Path) -> Result<Vec<Station>, LocateStationError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| LocateStationError::CacheRead(cache_path.to_path_buf(), e))?;
        let (decoded_stations, _) =
            bincode::serde::decode_from_slice::<Vec<Station>, _>(&bytes, BINCODE_CONFIG).map_err(
                |e| LocateStationError::CacheDecode(cache_path.to_path_buf(), Box::from(e)),
            )?;
        Ok(decoded_stations)
    }

    async fn fetch_stations() -> Result<Vec<Station>, LocateStationError> {
        let client = Client::new();
        let response = client
            .get(STATIONS_URL)
            .send()
            .await
            .map_err(|e| LocateStationError::NetworkRequest(STATIONS_URL.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    LocateStationError::HttpStatus {
                        url: STATIONS_URL.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    LocateStationError::NetworkRequest(STATIONS_URL.to_string(), e)
                });
            }
        };
        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let stream_reader = StreamReader::new(stream);
        let gzip_decoder = GzipDecoder::new(BufReader::new(stream_reader));
        let mut decoder_reader = BufReader::new(gzip_decoder);
        let mut decompressed_json = Vec::with_capacity(20_000_000);
        decoder_reader.read_to_end(&mut decompressed_json).await?;

        let stations = tokio::task::spawn_blocking(move || {
            serde_json::from_slice::<Vec<Station>>(&decompressed_json)
                .map_err(LocateStationError::from)
        })
        .await??;
        info!("Parsed {} stations from metadata feed", stations.len());
        Ok(stations)
    }

    async fn cache_stations(
        stations: Vec<Station>,
        cache_path: &Path,
    ) -> Result<(), LocateStationError> {
        let bincode_data = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(stations, BINCODE_CONFIG)
                .map_err(|e| LocateStationError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(&cache_path, &bincode_data)
            .await
            .map_err(|e| LocateStationError::CacheWrite(cache_path.to_path_buf(), e))?;
        info!(
            "Wrote station cache ({} bytes) to {}",
            bincode_data.len(),
            cache_path.display()
        );
        Ok(())
    }

    /// Finds up to N nearest stations matching the criteria, sorted by
    /// distance ascending. Uses a fast path for plain proximity queries and a
    /// heap-based approach with a heuristic iteration limit when an hourly
    /// inventory filter applies.
    pub fn query(
        &self,
        latitude: f64,
        longitude: f64,
        n_results: usize,
        max_distance_km: f64,
        required_data: Option<RequiredData>,
    ) -> Vec<(Station, f64)> {
        if n_results == 0 {
            return vec![];
        }

        match required_data {
            None => self.fast_proximity_query(latitude, longitude, n_results, max_distance_km),
            Some(required) => self.filtered_heap_query(
                latitude,
                longitude,
                n_results,
                max_distance_km,
                required,
            ),
        }
    }

    /// Proximity-only query: limits R-tree iteration and performs fewer
    /// haversine calculations.
    fn fast_proximity_query(
        &self,
        latitude: f64,
        longitude: f64,
        n_results: usize,
        max_distance_km: f64,
    ) -> Vec<(Station, f64)> {
        let query_point = [latitude, longitude];

        // Take more candidates than needed to absorb the difference between
        // R-tree ordering and haversine distance.
        let candidate_limit = (n_results * 2).max(20);

        let mut stations_with_dist: Vec<(Station, f64)> = self
            .rtree
            .nearest_neighbor_iter(&query_point)
            .take(candidate_limit)
            .filter_map(|station| {
                let dist_km = haversine_km(latitude, longitude, station);
                if dist_km <= max_distance_km {
                    Some((station.to_owned(), dist_km))
                } else {
                    None
                }
            })
            .collect();

        stations_with_dist.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        stations_with_dist.truncate(n_results);
        stations_with_dist
    }

    fn filtered_heap_query(
        &self,
        latitude: f64,
        longitude: f64,
        n_results: usize,
        max_distance_km: f64,
        required_data: RequiredData,
    ) -> Vec<(Station, f64)> {
        let query_point = [latitude, longitude];
        let mut heap: BinaryHeap<StationCandidate<'_>> = BinaryHeap::with_capacity(n_results);

        let iteration_limit = n_results + 1;
        let mut items_checked = 0;

        for station in self.rtree.nearest_neighbor_iter(&query_point) {
            items_checked += 1;

            if !Self::has_hourly_coverage(station, &required_data) {
                continue;
            }

            let dist_km = haversine_km(latitude, longitude, station);
            if dist_km * 2.0 > max_distance_km {
                // R-tree order guarantees nothing closer is coming.
                break;
            }
            if dist_km > max_distance_km {
                continue;
            }

            let candidate = StationCandidate {
                distance_km: OrderedFloat(dist_km),
                station,
            };

            if heap.len() < n_results {
                heap.push(candidate);
            } else {
                // unwrap safe: heap is full (len >= n_results >= 1)
                let worst = heap.peek().unwrap().distance_km;
                if candidate.distance_km < worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }

            if items_checked >= iteration_limit && heap.len() == n_results {
                break;
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.station.to_owned(), c.distance_km.into_inner()))
            .collect()
    }

    /// Checks the station's reported hourly inventory against the request.
    fn has_hourly_coverage(station: &Station, required: &RequiredData) -> bool {
        let (Some(inv_start), Some(inv_end)) =
            (station.inventory.hourly.start, station.inventory.hourly.end)
        else {
            return false;
        };
        match required {
            RequiredData::Any => true,
            RequiredData::SpecificDate(req) => inv_start <= *req && *req <= inv_end,
            RequiredData::DateRange { start, end } => inv_start <= *start && inv_end >= *end,
            RequiredData::Year(year) => {
                let Some(req_start) = NaiveDate::from_ymd_opt(*year, 1, 1) else {
                    return false;
                };
                let Some(req_end) = NaiveDate::from_ymd_opt(*year, 12, 31) else {
                    return false;
                };
                inv_start <= req_start && inv_end >= req_end
            }
        }
    }
}

fn haversine_km(latitude: f64, longitude: f64, station: &Station) -> f64 {
    distance(
        HaversineLocation {
            latitude,
            longitude,
        },
        HaversineLocation {
            latitude: station.location.latitude,
            longitude: station.location.longitude,
        },
        Units::Kilometers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::station::{DateRange, Identifiers, Inventory, StationLocation, YearRange};
    use std::collections::HashMap;

    fn station(id: &str, lat: f64, lon: f64, hourly: (Option<i32>, Option<i32>)) -> Station {
        let to_date = |y: Option<i32>, end: bool| {
            y.map(|y| {
                if end {
                    NaiveDate::from_ymd_opt(y, 12, 31).unwrap()
                } else {
                    NaiveDate::from_ymd_opt(y, 1, 1).unwrap()
                }
            })
        };
        Station {
            id: id.to_string(),
            country: "XX".to_string(),
            region: None,
            timezone: None,
            name: HashMap::new(),
            identifiers: Identifiers {
                national: None,
                wmo: None,
                icao: None,
            },
            location: StationLocation {
                latitude: lat,
                longitude: lon,
                elevation: None,
            },
            inventory: Inventory {
                daily: DateRange {
                    start: None,
                    end: None,
                },
                hourly: DateRange {
                    start: to_date(hourly.0, false),
                    end: to_date(hourly.1, true),
                },
                model: DateRange {
                    start: None,
                    end: None,
                },
                monthly: YearRange {
                    start: None,
                    end: None,
                },
                normals: YearRange {
                    start: None,
                    end: None,
                },
            },
        }
    }

    fn locator() -> StationLocator {
        StationLocator::from_stations(vec![
            station("near", 52.52, 13.40, (Some(2000), Some(2024))),
            station("nearer", 52.521, 13.401, (None, None)),
            station("far", 48.85, 2.35, (Some(2000), Some(2024))),
        ])
    }

    #[test]
    fn proximity_query_sorts_by_distance_and_respects_radius() {
        let results = locator().query(52.52, 13.40, 5, 50.0, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.id, "near");
        assert_eq!(results[1].0.id, "nearer");
        assert!(results[0].1 <= results[1].1);
    }

    #[test]
    fn inventory_filter_skips_stations_without_hourly_coverage() {
        let results = locator().query(52.52, 13.40, 5, 50.0, Some(RequiredData::Any));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "near");
    }

    #[test]
    fn date_range_filter_requires_full_containment() {
        let covered = RequiredData::DateRange {
            start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2010, 12, 31).unwrap(),
        };
        assert_eq!(locator().query(52.52, 13.40, 5, 50.0, Some(covered)).len(), 1);

        let not_covered = RequiredData::DateRange {
            start: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2010, 12, 31).unwrap(),
        };
        assert!(locator()
            .query(52.52, 13.40, 5, 50.0, Some(not_covered))
            .is_empty());
    }

    #[test]
    fn zero_results_and_tight_radius_return_empty() {
        assert!(locator().query(52.52, 13.40, 0, 50.0, None).is_empty());
        assert!(locator().query(0.0, 0.0, 5, 1.0, None).is_empty());
    }

    #[test]
    fn year_filter_matches_covered_year() {
        let results = locator().query(52.52, 13.40, 5, 50.0, Some(RequiredData::Year(2023)));
        assert_eq!(results.len(), 1);
        assert!(locator()
            .query(52.52, 13.40, 5, 50.0, Some(RequiredData::Year(1999)))
            .is_empty());
    }
}
