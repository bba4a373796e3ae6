//! Convenience outputs of reconciled pairs: a CSV snapshot and a Polars frame.

use crate::cache::error::CacheError;
use crate::cache::partition::write_csv_atomic;
use crate::types::observation::TIMESTAMP_FORMAT;
use crate::types::reconciled::ReconciledPair;
use log::info;
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct SnapshotRow<'a> {
    timestamp: String,
    date: String,
    time: String,
    station_id: &'a str,
    station_name: &'a str,
    region_code: &'a str,
    region_name: &'a str,
    horizon: String,
    observed_irradiance: f64,
    forecast_irradiance: f64,
    observed_temperature: Option<f64>,
    forecast_temperature: Option<f64>,
    observed_wind_speed: Option<f64>,
    forecast_wind_speed: Option<f64>,
}

impl<'a> From<&'a ReconciledPair> for SnapshotRow<'a> {
    fn from(pair: &'a ReconciledPair) -> Self {
        SnapshotRow {
            timestamp: pair.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            date: pair.timestamp.format("%Y-%m-%d").to_string(),
            time: pair.timestamp.format("%H:%M").to_string(),
            station_id: &pair.station_id,
            station_name: &pair.station_name,
            region_code: &pair.region_code,
            region_name: &pair.region_name,
            horizon: pair.horizon.to_string(),
            observed_irradiance: pair.observed_irradiance,
            forecast_irradiance: pair.forecast_irradiance,
            observed_temperature: pair.observed_temperature,
            forecast_temperature: pair.forecast_temperature,
            observed_wind_speed: pair.observed_wind_speed,
            forecast_wind_speed: pair.forecast_wind_speed,
        }
    }
}

/// Writes `pairs` as a UTF-8-with-BOM CSV at `path`, replacing any previous snapshot.
/// The snapshot is an export only; nothing in this crate reads it back.
pub fn write_snapshot(pairs: &[ReconciledPair], path: &Path) -> Result<(), CacheError> {
    write_csv_atomic(path, pairs.iter().map(SnapshotRow::from))?;
    info!("Wrote {} reconciled row(s) to {}", pairs.len(), path.display());
    Ok(())
}

/// Builds a `DataFrame` with one row per pair, for plotting and ad-hoc analysis.
pub fn to_dataframe(pairs: &[ReconciledPair]) -> PolarsResult<DataFrame> {
    let strings = |f: fn(&ReconciledPair) -> String| pairs.iter().map(f).collect::<Vec<String>>();
    let floats = |f: fn(&ReconciledPair) -> Option<f64>| pairs.iter().map(f).collect::<Vec<Option<f64>>>();

    df!(
        "timestamp" => strings(|p| p.timestamp.format(TIMESTAMP_FORMAT).to_string()),
        "station_id" => strings(|p| p.station_id.clone()),
        "region_code" => strings(|p| p.region_code.clone()),
        "horizon" => strings(|p| p.horizon.to_string()),
        "observed_irradiance" => pairs.iter().map(|p| p.observed_irradiance).collect::<Vec<f64>>(),
        "forecast_irradiance" => pairs.iter().map(|p| p.forecast_irradiance).collect::<Vec<f64>>(),
        "observed_temperature" => floats(|p| p.observed_temperature),
        "forecast_temperature" => floats(|p| p.forecast_temperature),
        "observed_wind_speed" => floats(|p| p.observed_wind_speed),
        "forecast_wind_speed" => floats(|p| p.forecast_wind_speed),
    )
}
