//! Solar-irradiance forecast records and their mapping from the upstream `result` shape.

use crate::types::data_source::{Horizon, Region};
use crate::types::values;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::Value;

/// One forecast value issued on `base_date` for the hour `forecast_date forecast_time`.
///
/// `irradiance` is instantaneous power per area (W/m²) as published; it is `None` when the
/// upstream value was missing or non-numeric. The [`Horizon`] is fixed at normalisation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub region_code: String,
    pub region_name: String,
    pub base_date: NaiveDate,
    pub forecast_date: NaiveDate,
    pub forecast_time: NaiveTime,
    pub horizon: Horizon,
    pub irradiance: Option<f64>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl ForecastRecord {
    /// The forecast target hour, the key it is joined and de-duplicated on.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.forecast_date.and_time(self.forecast_time)
    }
}

/// One element of the forecast response's `result` array.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawForecast {
    #[serde(rename = "baseDate")]
    base_date: Option<Value>,
    #[serde(rename = "fcstDate")]
    fcst_date: Option<Value>,
    #[serde(rename = "fcstTime")]
    fcst_time: Option<Value>,
    srad: Option<Value>,
    temp: Option<Value>,
    wspd: Option<Value>,
}

impl RawForecast {
    /// Maps the upstream field names onto [`ForecastRecord`] and classifies the horizon.
    /// Returns `None` when the base date, forecast date or forecast time is unusable.
    pub(crate) fn normalize(self, region: &Region) -> Option<ForecastRecord> {
        let base_date = values::compact_date(self.base_date.as_ref())?;
        let forecast_date = values::compact_date(self.fcst_date.as_ref())?;
        let forecast_time = values::hhmm(self.fcst_time.as_ref())?;
        Some(ForecastRecord {
            region_code: region.code().to_string(),
            region_name: region.name().to_string(),
            base_date,
            forecast_date,
            forecast_time,
            horizon: Horizon::classify(base_date, forecast_date),
            irradiance: values::number(self.srad.as_ref()),
            temperature: values::number(self.temp.as_ref()),
            wind_speed: values::number(self.wspd.as_ref()),
        })
    }
}
