//! Timestamp-keyed reconciliation of ground-truth observations with forecast records.

pub mod evaluation;
pub mod snapshot;

use crate::types::calendar::DateRange;
use crate::types::forecast::ForecastRecord;
use crate::types::observation::Observation;
use crate::types::reconciled::ReconciledPair;
use chrono::NaiveDateTime;
use log::debug;
use std::collections::HashMap;

/// Converts instantaneous forecast irradiance (W/m²) into hourly energy (MJ/m²).
pub const FORECAST_TO_HOURLY_ENERGY: f64 = 0.0036;

/// Joins observations and forecasts of one horizon class on exact timestamp equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    /// Missing or non-numeric forecast irradiance counts as `0`, then the unit factor applies.
    pub fn convert_forecast_irradiance(value: Option<f64>) -> f64 {
        value.unwrap_or(0.0) * FORECAST_TO_HOURLY_ENERGY
    }

    /// Inner join on timestamp. Every matching forecast yields its own pair, in observation order
    /// then forecast order. Pairs whose observed irradiance is missing are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use radiation_sync::{ForecastRecord, Horizon, Observation, Reconciler};
    ///
    /// let day = NaiveDate::from_ymd_opt(2024, 7, 12).unwrap();
    /// let at_ten = day.and_hms_opt(10, 0, 0).unwrap();
    /// let observation = Observation {
    ///     station_id: "146".into(),
    ///     station_name: "Jeonju".into(),
    ///     timestamp: at_ten,
    ///     irradiance: Some(1.5),
    ///     temperature: None,
    ///     wind_speed: None,
    /// };
    /// let forecast = ForecastRecord {
    ///     region_code: "4511300000".into(),
    ///     region_name: "Jeonju".into(),
    ///     base_date: day,
    ///     forecast_date: day,
    ///     forecast_time: at_ten.time(),
    ///     horizon: Horizon::SameDay,
    ///     irradiance: Some(400.0),
    ///     temperature: None,
    ///     wind_speed: None,
    /// };
    ///
    /// let pairs = Reconciler.reconcile(&[observation], &[forecast]);
    /// assert_eq!(pairs.len(), 1);
    /// assert_eq!(pairs[0].observed_irradiance, 1.5);
    /// assert!((pairs[0].forecast_irradiance - 1.44).abs() < 1e-12);
    /// ```
    pub fn reconcile(&self, observations: &[Observation], forecasts: &[ForecastRecord]) -> Vec<ReconciledPair> {
        let mut by_timestamp: HashMap<NaiveDateTime, Vec<&ForecastRecord>> = HashMap::new();
        for forecast in forecasts {
            by_timestamp.entry(forecast.timestamp()).or_default().push(forecast);
        }

        let mut pairs = Vec::new();
        let mut missing_observed = 0usize;
        for observation in observations {
            let Some(matches) = by_timestamp.get(&observation.timestamp) else {
                continue;
            };
            let Some(observed) = observation.irradiance else {
                missing_observed += matches.len();
                continue;
            };
            for forecast in matches {
                pairs.push(ReconciledPair {
                    timestamp: observation.timestamp,
                    station_id: observation.station_id.clone(),
                    station_name: observation.station_name.clone(),
                    region_code: forecast.region_code.clone(),
                    region_name: forecast.region_name.clone(),
                    horizon: forecast.horizon,
                    observed_irradiance: observed,
                    forecast_irradiance: Self::convert_forecast_irradiance(forecast.irradiance),
                    observed_temperature: observation.temperature,
                    forecast_temperature: forecast.temperature,
                    observed_wind_speed: observation.wind_speed,
                    forecast_wind_speed: forecast.wind_speed,
                });
            }
        }
        debug!(
            "Reconciled {} pair(s), dropped {} without observed irradiance",
            pairs.len(),
            missing_observed
        );
        pairs
    }

    /// Like [`Reconciler::reconcile`], keeping only pairs whose timestamp lies in `window`
    /// (from the first minute of its start date to the last of its end date).
    pub fn reconcile_within(
        &self,
        observations: &[Observation],
        forecasts: &[ForecastRecord],
        window: &DateRange,
    ) -> Vec<ReconciledPair> {
        let mut pairs = self.reconcile(observations, forecasts);
        pairs.retain(|pair| window.contains_datetime(pair.timestamp));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_source::Horizon;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn observation(timestamp: NaiveDateTime, irradiance: Option<f64>) -> Observation {
        Observation {
            station_id: "146".to_string(),
            station_name: "Jeonju".to_string(),
            timestamp,
            irradiance,
            temperature: Some(28.0),
            wind_speed: Some(1.0),
        }
    }

    fn forecast(timestamp: NaiveDateTime, irradiance: Option<f64>) -> ForecastRecord {
        ForecastRecord {
            region_code: "4511300000".to_string(),
            region_name: "Jeonju".to_string(),
            base_date: timestamp.date(),
            forecast_date: timestamp.date(),
            forecast_time: timestamp.time(),
            horizon: Horizon::SameDay,
            irradiance,
            temperature: Some(27.0),
            wind_speed: Some(2.0),
        }
    }

    #[test]
    fn test_unit_conversion() {
        assert!((Reconciler::convert_forecast_irradiance(Some(100.0)) - 0.36).abs() < 1e-12);
        assert!((Reconciler::convert_forecast_irradiance(Some(400.0)) - 1.44).abs() < 1e-12);
    }

    #[test]
    fn test_matching_hour_is_joined_and_converted() {
        let pairs = Reconciler.reconcile(
            &[observation(at(12, 10), Some(1.5))],
            &[forecast(at(12, 10), Some(400.0))],
        );
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.observed_irradiance, 1.5);
        assert!((pair.forecast_irradiance - 1.44).abs() < 1e-12);
        assert_eq!(pair.station_id, "146");
        assert_eq!(pair.region_code, "4511300000");
        assert_eq!(pair.forecast_temperature, Some(27.0));
        assert_eq!(pair.observed_wind_speed, Some(1.0));
    }

    #[test]
    fn test_null_observed_irradiance_is_excluded() {
        let pairs = Reconciler.reconcile(
            &[observation(at(12, 10), None)],
            &[forecast(at(12, 10), Some(400.0))],
        );
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_non_numeric_forecast_is_zero_not_dropped() {
        let pairs = Reconciler.reconcile(
            &[observation(at(12, 10), Some(0.2))],
            &[forecast(at(12, 10), None)],
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].forecast_irradiance, 0.0);
    }

    #[test]
    fn test_only_shared_timestamps_survive() {
        let pairs = Reconciler.reconcile(
            &[observation(at(12, 9), Some(0.5)), observation(at(12, 10), Some(1.5))],
            &[forecast(at(12, 10), Some(400.0)), forecast(at(12, 11), Some(500.0))],
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].timestamp, at(12, 10));
    }

    #[test]
    fn test_duplicate_forecasts_each_pair_up() {
        let pairs = Reconciler.reconcile(
            &[observation(at(12, 10), Some(1.5))],
            &[forecast(at(12, 10), Some(400.0)), forecast(at(12, 10), Some(100.0))],
        );
        assert_eq!(pairs.len(), 2);
        assert!(pairs[1].forecast_irradiance < pairs[0].forecast_irradiance);
    }

    #[test]
    fn test_window_limits_joined_rows() {
        let window = DateRange::new(at(12, 0).date(), at(12, 0).date()).unwrap();
        let pairs = Reconciler.reconcile_within(
            &[observation(at(12, 23), Some(0.0)), observation(at(13, 10), Some(1.0))],
            &[forecast(at(12, 23), Some(0.0)), forecast(at(13, 10), Some(300.0))],
            &window,
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].timestamp, at(12, 23));
    }
}
