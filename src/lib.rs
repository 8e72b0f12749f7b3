//! Fetch hourly weather observations for a set of named geographic points,
//! merge them into one wide time-indexed table, and clean/scale the result
//! in preparation for modeling.
//!
//! The crate has two independent halves that compose only through a shared
//! [`polars::frame::DataFrame`] contract:
//!
//! * [`HourlyWeatherCollector`] — queries the bulk weather feeds per named
//!   location, normalizes column presence, prefixes columns with the location
//!   name, and outer-joins everything on the `datetime` column.
//! * [`DataPreprocessor`] — missing-value imputation, IQR outlier removal,
//!   and standardization of selected columns on an arbitrary dataframe.
//!
//! ```no_run
//! use weatherprep::{DataPreprocessor, HourlyWeatherCollector, LatLon, WeatherClient};
//! use chrono::NaiveDate;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), weatherprep::WeatherPrepError> {
//! let client = WeatherClient::new().await?;
//! let collector = HourlyWeatherCollector::new(&client);
//!
//! let collection = collector
//!     .collect()
//!     .locations(vec![
//!         ("istanbul".to_string(), LatLon(41.0082, 28.9784)),
//!         ("ankara".to_string(), LatLon(39.9334, 32.8597)),
//!     ])
//!     .start(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
//!     .end(NaiveDate::from_ymd_opt(2023, 1, 31).unwrap())
//!     .call()
//!     .await?;
//!
//! let mut prep = DataPreprocessor::new();
//! let df = prep.handle_missing_values(collection.data)?;
//! let df = prep.detect_and_remove_outliers(df, Default::default())?;
//! let df = prep.scale_features(df, &["istanbul_temp", "ankara_temp"])?;
//! println!("{df}");
//! # Ok(())
//! # }
//! ```

mod client;
mod collector;
mod error;
mod preprocess;
mod stations;
mod types;
mod utils;
mod weather_data;

pub use error::WeatherPrepError;

pub use client::*;
pub use collector::*;
pub use preprocess::*;

pub use types::hourly_frame::*;
pub use types::inventory::RequiredData;
pub use types::station::*;

pub use stations::error::LocateStationError;
pub use weather_data::error::WeatherDataError;
