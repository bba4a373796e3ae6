//! Defines the two upstream data sources, the forecast horizon split, and forecast regions.

use chrono::NaiveDate;
use std::fmt;

/// How far ahead of its issue date a forecast record looks.
///
/// The split is made exactly once, when a raw forecast record is normalised, by comparing the
/// record's base (issue) date with its forecast date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    /// Forecast for the day it was issued ("today").
    SameDay,
    /// Forecast for a later day than it was issued ("tomorrow" and beyond).
    NextDay,
}

impl Horizon {
    pub fn classify(base_date: NaiveDate, forecast_date: NaiveDate) -> Self {
        if base_date == forecast_date {
            Horizon::SameDay
        } else {
            Horizon::NextDay
        }
    }

    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            Horizon::SameDay => "today",
            Horizon::NextDay => "tomorrow",
        }
    }

    pub(crate) fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "today" | "same-day" => Some(Horizon::SameDay),
            "tomorrow" | "next-day" => Some(Horizon::NextDay),
            _ => None,
        }
    }

    pub const ALL: [Horizon; 2] = [Horizon::SameDay, Horizon::NextDay];
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}

impl std::str::FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Horizon::from_path_segment(s).ok_or_else(|| format!("unknown forecast horizon '{s}'"))
    }
}

/// The upstream service a cache partition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Hourly ground-truth observations (ASOS).
    GroundTruth,
    /// Solar-irradiance forecasts of one horizon class.
    Forecast(Horizon),
}

impl DataSource {
    /// Directory segments below the cache root, before the station/region key.
    pub(crate) fn path_segments(&self) -> Vec<&'static str> {
        match self {
            DataSource::GroundTruth => vec!["ASOS"],
            DataSource::Forecast(horizon) => vec!["maru", horizon.path_segment()],
        }
    }
}

/// Formats a `DataSource` using its cache path, e.g. `ASOS` or `maru/today`.
///
/// # Examples
///
/// ```
/// use radiation_sync::{DataSource, Horizon};
///
/// assert_eq!(DataSource::GroundTruth.to_string(), "ASOS");
/// assert_eq!(DataSource::Forecast(Horizon::NextDay).to_string(), "maru/tomorrow");
/// ```
impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segments().join("/"))
    }
}

/// Width of a forecast region code.
const REGION_CODE_WIDTH: usize = 10;

/// A forecast region: the code sent upstream and the display name stamped on its records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    code: String,
    name: String,
}

impl Region {
    /// Creates a region, right-padding the code with `0` to ten digits.
    ///
    /// ```
    /// use radiation_sync::Region;
    ///
    /// let region = Region::new("4511300", "Jeonbuk Jeonju");
    /// assert_eq!(region.code(), "4511300000");
    /// ```
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let code = code.into().trim().to_string();
        let code = format!("{:0<width$}", code, width = REGION_CODE_WIDTH);
        Self {
            code,
            name: name.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_split_on_issue_date() {
        let base = NaiveDate::from_ymd_opt(2024, 7, 12).unwrap();
        assert_eq!(Horizon::classify(base, base), Horizon::SameDay);
        let next = NaiveDate::from_ymd_opt(2024, 7, 13).unwrap();
        assert_eq!(Horizon::classify(base, next), Horizon::NextDay);
        let after = NaiveDate::from_ymd_opt(2024, 7, 14).unwrap();
        assert_eq!(Horizon::classify(base, after), Horizon::NextDay);
    }

    #[test]
    fn test_horizon_parses_both_spellings() {
        assert_eq!("today".parse::<Horizon>(), Ok(Horizon::SameDay));
        assert_eq!("next-day".parse::<Horizon>(), Ok(Horizon::NextDay));
        assert!("yesterday".parse::<Horizon>().is_err());
    }

    #[test]
    fn test_region_code_padding_leaves_full_codes_alone() {
        assert_eq!(Region::new("4511300000", "x").code(), "4511300000");
        assert_eq!(Region::new(" 45113 ", "x").code(), "4511300000");
    }
}
