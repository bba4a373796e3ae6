//! Ground-truth hourly observations and their mapping from the upstream item shape.

use crate::types::values;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::Value;

/// Timestamp format used by the ground-truth service and by every cache file.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One hourly ground-truth reading from an observation station.
///
/// Identity is `(station_id, timestamp)`. Irradiance is cumulative energy per area over the hour
/// (MJ/m²); an empty upstream value is stored as `0.0`, a null one as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: String,
    pub station_name: String,
    pub timestamp: NaiveDateTime,
    pub irradiance: Option<f64>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl Observation {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// One `item` of the ground-truth response, with every field kept as loose JSON.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawObservation {
    tm: Option<Value>,
    #[serde(rename = "stnId")]
    stn_id: Option<Value>,
    #[serde(rename = "stnNm")]
    stn_nm: Option<Value>,
    icsr: Option<Value>,
    ta: Option<Value>,
    ws: Option<Value>,
}

impl RawObservation {
    /// Maps the upstream field names onto [`Observation`]. Returns `None` when the timestamp is
    /// missing or unparsable; `station` fills in a missing station id.
    pub(crate) fn normalize(self, station: &str) -> Option<Observation> {
        let tm = values::text(self.tm.as_ref())?;
        let timestamp = NaiveDateTime::parse_from_str(&tm, TIMESTAMP_FORMAT).ok()?;
        Some(Observation {
            station_id: values::text(self.stn_id.as_ref()).unwrap_or_else(|| station.to_string()),
            station_name: values::text(self.stn_nm.as_ref()).unwrap_or_default(),
            timestamp,
            irradiance: values::irradiance_or_zero(self.icsr.as_ref()),
            temperature: values::number(self.ta.as_ref()),
            wind_speed: values::number(self.ws.as_ref()),
        })
    }
}
