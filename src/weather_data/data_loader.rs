//! Downloads and caches the raw hourly observation files for single stations.
//!
//! Each station's data arrives as one gzipped, headerless CSV covering the
//! station's full history. The loader parses it, derives the `datetime`
//! column, writes a parquet cache file, and hands out lazy scans of that
//! cache.

use crate::types::hourly_frame::{DATETIME_COLUMN, HOURLY_SCHEMA_COLUMNS};
use crate::weather_data::error::WeatherDataError;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::{info, warn};
use polars::frame::DataFrame;
use polars::prelude::*;
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::{fs, task};
use tokio_util::io::StreamReader;

const BULK_DATA_URL: &str = "https://bulk.meteostat.net/v2/hourly";
const MS_PER_HOUR: i64 = 3_600_000;

pub struct HourlyDataLoader {
    cache_dir: PathBuf,
    download_client: Client,
}

impl HourlyDataLoader {
    pub fn new(cache_dir: &Path) -> HourlyDataLoader {
        HourlyDataLoader {
            cache_dir: cache_dir.to_path_buf(),
            download_client: Client::new(),
        }
    }

    /// Loads the hourly frame for one station, downloading and converting to
    /// parquet on cache miss. Returns a lazy scan of the cached file.
    pub async fn get_frame(&self, station: &str) -> Result<LazyFrame, WeatherDataError> {
        let parquet_path = self.cache_dir.join(format!("hourly-{station}.parquet"));

        if fs::metadata(&parquet_path).await.is_ok() {
            info!("Cache hit for station {station} at {parquet_path:?}");
        } else {
            warn!("Cache miss for station {station}, downloading and processing");
            let raw_bytes = self.download(station).await?;
            let df = Self::csv_to_dataframe(raw_bytes, station).await?;

            fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(|e| WeatherDataError::CacheDirCreation(self.cache_dir.clone(), e))?;
            Self::cache_dataframe(df, &parquet_path).await?;
            info!("Cached hourly data for station {station} to {parquet_path:?}");
        }

        LazyFrame::scan_parquet(&parquet_path, Default::default())
            .map_err(|e| WeatherDataError::ParquetScan(parquet_path.clone(), e))
    }

    /// Downloads and decompresses the raw CSV for one station.
    async fn download(&self, station: &str) -> Result<Vec<u8>, WeatherDataError> {
        let url = format!("{BULK_DATA_URL}/{station}.csv.gz");
        info!("Downloading hourly data from {url}");

        let response = self
            .download_client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {url}: {e:?}");
                return Err(if let Some(status) = e.status() {
                    WeatherDataError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    WeatherDataError::NetworkRequest(url, e)
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let stream_reader = StreamReader::new(stream);
        let mut decoder = GzipDecoder::new(stream_reader);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .await
            .map_err(WeatherDataError::DownloadIo)?;
        info!(
            "Downloaded and decompressed {} bytes for station {station}",
            decompressed.len()
        );
        Ok(decompressed)
    }

    /// Parses raw headerless CSV bytes into a DataFrame in a blocking task,
    /// assigns the hourly schema column names, and derives `datetime`.
    pub(crate) async fn csv_to_dataframe(
        bytes: Vec<u8>,
        station: &str,
    ) -> Result<DataFrame, WeatherDataError> {
        let station_owned = station.to_string();

        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new().map_err(|e| WeatherDataError::CsvReadIo {
                station: station_owned.clone(),
                source: e,
            })?;
            temp_file
                .write_all(&bytes)
                .map_err(|e| WeatherDataError::CsvReadIo {
                    station: station_owned.clone(),
                    source: e,
                })?;
            temp_file.flush().map_err(|e| WeatherDataError::CsvReadIo {
                station: station_owned.clone(),
                source: e,
            })?;

            let mut df = CsvReadOptions::default()
                .with_has_header(false)
                .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
                .map_err(|e| WeatherDataError::CsvReadPolars {
                    station: station_owned.clone(),
                    source: e,
                })?
                .finish()
                .map_err(|e| WeatherDataError::CsvReadPolars {
                    station: station_owned.clone(),
                    source: e,
                })?;

            if df.width() != HOURLY_SCHEMA_COLUMNS.len() {
                warn!(
                    "CSV column count ({}) does not match hourly schema length ({}) for station {}",
                    df.width(),
                    HOURLY_SCHEMA_COLUMNS.len(),
                    station_owned
                );
                return Err(WeatherDataError::SchemaMismatch {
                    station: station_owned,
                    expected: HOURLY_SCHEMA_COLUMNS.len(),
                    found: df.width(),
                });
            }

            df.set_column_names(HOURLY_SCHEMA_COLUMNS.iter().copied())
                .map_err(WeatherDataError::DataFrameProcessing)?;

            Self::with_datetime_column(df)
        })
        .await?
    }

    /// Combines the `date` and `hour` columns into a millisecond-precision
    /// `datetime` column (timezone-naive UTC).
    fn with_datetime_column(df: DataFrame) -> Result<DataFrame, WeatherDataError> {
        let datetime_expr = (col("date")
            .cast(DataType::Date)
            .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
            .cast(DataType::Int64)
            + col("hour").cast(DataType::Int64) * lit(MS_PER_HOUR))
        .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
        .alias(DATETIME_COLUMN);

        df.lazy()
            .with_column(datetime_expr)
            .collect()
            .map_err(WeatherDataError::DataFrameProcessing)
    }

    /// Writes the DataFrame to a parquet cache file via spawn_blocking;
    /// ParquetWriter needs `&mut df`.
    async fn cache_dataframe(mut df: DataFrame, path: &Path) -> Result<(), WeatherDataError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let file = std::fs::File::create(&path_buf)
                .map_err(|e| WeatherDataError::ParquetWriteIo(path_buf.clone(), e))?;
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| WeatherDataError::ParquetWritePolars(path_buf, e))?;
            Ok::<(), WeatherDataError>(())
        })
        .await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    // Two rows in the raw bulk format: date, hour, then 11 observation fields.
    const SAMPLE_CSV: &str = "\
2023-05-01,0,12.5,8.1,75,0.0,,180,14.4,,1013.2,,3
2023-05-01,1,12.1,8.0,77,0.2,,175,12.9,,1013.0,,3
";

    #[tokio::test]
    async fn csv_parses_with_schema_names_and_datetime() {
        let df = HourlyDataLoader::csv_to_dataframe(SAMPLE_CSV.as_bytes().to_vec(), "10637")
            .await
            .unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), HOURLY_SCHEMA_COLUMNS.len() + 1);
        let names = df.get_column_names();
        assert_eq!(names.last().unwrap().as_str(), DATETIME_COLUMN);

        let datetime = df.column(DATETIME_COLUMN).unwrap();
        assert!(matches!(
            datetime.dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));

        let expected: NaiveDateTime = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        let ms = datetime
            .as_materialized_series()
            .datetime()
            .unwrap()
            .physical()
            .get(1)
            .unwrap();
        assert_eq!(ms, expected.and_utc().timestamp_millis());
    }

    #[tokio::test]
    async fn csv_with_wrong_column_count_is_rejected() {
        let bad = b"2023-05-01,0,12.5\n".to_vec();
        let err = HourlyDataLoader::csv_to_dataframe(bad, "10637")
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherDataError::SchemaMismatch { .. }));
    }
}
