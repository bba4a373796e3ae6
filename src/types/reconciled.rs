use crate::types::data_source::Horizon;
use chrono::NaiveDateTime;

/// One observation joined with one forecast for the same hour.
///
/// `forecast_irradiance` is already converted to the observation's unit (MJ/m² per hour).
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledPair {
    pub timestamp: NaiveDateTime,
    pub station_id: String,
    pub station_name: String,
    pub region_code: String,
    pub region_name: String,
    pub horizon: Horizon,
    pub observed_irradiance: f64,
    pub forecast_irradiance: f64,
    pub observed_temperature: Option<f64>,
    pub forecast_temperature: Option<f64>,
    pub observed_wind_speed: Option<f64>,
    pub forecast_wind_speed: Option<f64>,
}
