use crate::weather_data::data_loader::HourlyDataLoader;
use crate::weather_data::error::WeatherDataError;
use polars::prelude::LazyFrame;
use std::collections::{hash_map::Entry, HashMap};
use std::path::Path;
use tokio::sync::Mutex;

/// Hands out hourly lazy frames per station, memoizing the scan so repeated
/// requests for the same station skip the loader.
pub struct FrameFetcher {
    loader: HourlyDataLoader,
    lazyframe_cache: Mutex<HashMap<String, LazyFrame>>,
}

impl FrameFetcher {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            loader: HourlyDataLoader::new(cache_dir),
            lazyframe_cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn hourly_lazyframe(&self, station: &str) -> Result<LazyFrame, WeatherDataError> {
        // Fast path: already memoized.
        {
            let cache = self.lazyframe_cache.lock().await;
            if let Some(cached) = cache.get(station) {
                return Ok(cached.clone());
            }
        } // Release the lock before the potentially slow load.

        let loaded_frame = self.loader.get_frame(station).await?;

        let mut cache = self.lazyframe_cache.lock().await;
        match cache.entry(station.to_string()) {
            Entry::Occupied(entry) => {
                // Another task loaded it while we were; use theirs.
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                entry.insert(loaded_frame.clone());
                Ok(loaded_frame)
            }
        }
    }
}
