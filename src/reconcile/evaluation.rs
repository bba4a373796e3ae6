//! Accuracy of forecast against observation over a set of reconciled pairs.

use crate::types::reconciled::ReconciledPair;
use std::fmt;

/// The quantity being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Irradiance,
    Temperature,
    WindSpeed,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Irradiance, Metric::Temperature, Metric::WindSpeed];

    /// `(observed, forecast)` for this metric, if both sides are present.
    pub fn values(&self, pair: &ReconciledPair) -> Option<(f64, f64)> {
        match self {
            Metric::Irradiance => Some((pair.observed_irradiance, pair.forecast_irradiance)),
            Metric::Temperature => Some((pair.observed_temperature?, pair.forecast_temperature?)),
            Metric::WindSpeed => Some((pair.observed_wind_speed?, pair.forecast_wind_speed?)),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Irradiance => "irradiance",
            Metric::Temperature => "temperature",
            Metric::WindSpeed => "wind speed",
        };
        write!(f, "{}", name)
    }
}

/// Coefficient of determination, RMSE and least-squares line of forecast on observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub metric: Metric,
    pub count: usize,
    /// `1 - SS_res / SS_tot` with the observation as truth.
    pub r_squared: f64,
    pub rmse: f64,
    /// Slope of `forecast = slope * observed + intercept`.
    pub slope: f64,
    pub intercept: f64,
}

impl Evaluation {
    /// Evaluates `metric` over the pairs where both sides are present. Returns `None` when no
    /// pair qualifies.
    pub fn of(pairs: &[ReconciledPair], metric: Metric) -> Option<Evaluation> {
        let values: Vec<(f64, f64)> = pairs.iter().filter_map(|pair| metric.values(pair)).collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean_obs = values.iter().map(|(o, _)| o).sum::<f64>() / n;
        let mean_fcst = values.iter().map(|(_, p)| p).sum::<f64>() / n;

        let ss_res: f64 = values.iter().map(|(o, p)| (o - p).powi(2)).sum();
        let ss_tot: f64 = values.iter().map(|(o, _)| (o - mean_obs).powi(2)).sum();
        let r_squared = if ss_tot == 0.0 {
            // constant truth
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        let covariance: f64 = values
            .iter()
            .map(|(o, p)| (o - mean_obs) * (p - mean_fcst))
            .sum();
        let slope = if ss_tot == 0.0 { 0.0 } else { covariance / ss_tot };

        Some(Evaluation {
            metric,
            count: values.len(),
            r_squared,
            rmse: (ss_res / n).sqrt(),
            slope,
            intercept: mean_fcst - slope * mean_obs,
        })
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: n={} R²={:.4} RMSE={:.4}",
            self.metric, self.count, self.r_squared, self.rmse
        )
    }
}
