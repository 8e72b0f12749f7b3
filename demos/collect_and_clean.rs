//! Collects a month of hourly weather for two cities, then runs the full
//! cleaning pipeline: imputation, outlier removal, standardization.

use chrono::NaiveDate;
use std::env;
use weatherprep::{
    DataPreprocessor, HourlyWeatherCollector, LatLon, OutlierPolicy, WeatherClient,
    WeatherPrepError,
};

#[tokio::main]
async fn main() -> Result<(), WeatherPrepError> {
    configure_polars_display();

    let client = WeatherClient::new().await?;
    let collector = HourlyWeatherCollector::new(&client);

    let collection = collector
        .collect()
        .locations(vec![
            ("berlin".to_string(), LatLon(52.5200, 13.4050)),
            ("utrecht".to_string(), LatLon(52.0836, 5.1257)),
        ])
        .start(NaiveDate::from_ymd_opt(2023, 9, 1).unwrap())
        .end(NaiveDate::from_ymd_opt(2023, 9, 30).unwrap())
        .allow_partial(true)
        .call()
        .await?;

    for failure in &collection.failed {
        eprintln!("Could not fetch '{}': {}", failure.name, failure.error);
    }
    println!("Collected:\n{}", collection.data);

    let mut prep = DataPreprocessor::new();
    let df = prep.handle_missing_values(collection.data)?;
    let df = prep.detect_and_remove_outliers(df, OutlierPolicy::Sequential)?;
    let df = prep.scale_features(df, &["berlin_temp", "utrecht_temp"])?;

    println!("Cleaned and scaled:\n{df}");
    if let Some(scaler) = prep.scaler("standard") {
        for (column, mean, std) in scaler.parameters() {
            println!("{column}: mean={mean:.3} std={std:.3}");
        }
    }

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show 20 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
