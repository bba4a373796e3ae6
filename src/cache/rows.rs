//! CSV row layouts of the cache files and the mapping to and from the canonical records.
//!
//! Rows carry derived helper columns (`date`, `time`) next to the full timestamp so the files
//! stay convenient to open in a spreadsheet; only the canonical columns are read back.

use crate::types::data_source::{DataSource, Horizon};
use crate::types::forecast::ForecastRecord;
use crate::types::observation::{Observation, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// A canonical record that can be stored in a monthly cache partition.
pub trait PartitionRecord: Sized + Clone + Send + 'static {
    type Row: Serialize + DeserializeOwned;

    /// The source this record is cached under.
    fn source(&self) -> DataSource;

    /// Timestamp the record is partitioned and de-duplicated by.
    fn timestamp(&self) -> NaiveDateTime;

    fn to_row(&self) -> Self::Row;

    fn from_row(row: Self::Row) -> Result<Self, String>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObservationRow {
    station_id: String,
    station_name: String,
    timestamp: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
    irradiance: Option<f64>,
    temperature: Option<f64>,
    wind_speed: Option<f64>,
}

impl PartitionRecord for Observation {
    type Row = ObservationRow;

    fn source(&self) -> DataSource {
        DataSource::GroundTruth
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn to_row(&self) -> ObservationRow {
        ObservationRow {
            station_id: self.station_id.clone(),
            station_name: self.station_name.clone(),
            timestamp: self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            date: self.timestamp.format(DATE_FORMAT).to_string(),
            time: self.timestamp.format(TIME_FORMAT).to_string(),
            irradiance: self.irradiance,
            temperature: self.temperature,
            wind_speed: self.wind_speed,
        }
    }

    fn from_row(row: ObservationRow) -> Result<Self, String> {
        let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| format!("bad timestamp '{}': {}", row.timestamp, e))?;
        Ok(Observation {
            station_id: row.station_id,
            station_name: row.station_name,
            timestamp,
            irradiance: row.irradiance,
            temperature: row.temperature,
            wind_speed: row.wind_speed,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForecastRow {
    region_code: String,
    region_name: String,
    base_date: String,
    forecast_date: String,
    forecast_time: String,
    #[serde(default)]
    timestamp: String,
    horizon: String,
    irradiance: Option<f64>,
    temperature: Option<f64>,
    wind_speed: Option<f64>,
}

impl PartitionRecord for ForecastRecord {
    type Row = ForecastRow;

    fn source(&self) -> DataSource {
        DataSource::Forecast(self.horizon)
    }

    fn timestamp(&self) -> NaiveDateTime {
        ForecastRecord::timestamp(self)
    }

    fn to_row(&self) -> ForecastRow {
        ForecastRow {
            region_code: self.region_code.clone(),
            region_name: self.region_name.clone(),
            base_date: self.base_date.format(DATE_FORMAT).to_string(),
            forecast_date: self.forecast_date.format(DATE_FORMAT).to_string(),
            forecast_time: self.forecast_time.format(TIME_FORMAT).to_string(),
            timestamp: ForecastRecord::timestamp(self).format(TIMESTAMP_FORMAT).to_string(),
            horizon: self.horizon.to_string(),
            irradiance: self.irradiance,
            temperature: self.temperature,
            wind_speed: self.wind_speed,
        }
    }

    fn from_row(row: ForecastRow) -> Result<Self, String> {
        let parse_date = |raw: &str| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| format!("bad date '{}': {}", raw, e))
        };
        let forecast_time = NaiveTime::parse_from_str(&row.forecast_time, TIME_FORMAT)
            .map_err(|e| format!("bad forecast time '{}': {}", row.forecast_time, e))?;
        let horizon = Horizon::from_path_segment(&row.horizon)
            .ok_or_else(|| format!("unknown horizon '{}'", row.horizon))?;
        Ok(ForecastRecord {
            base_date: parse_date(&row.base_date)?,
            forecast_date: parse_date(&row.forecast_date)?,
            forecast_time,
            horizon,
            region_code: row.region_code,
            region_name: row.region_name,
            irradiance: row.irradiance,
            temperature: row.temperature,
            wind_speed: row.wind_speed,
        })
    }
}
