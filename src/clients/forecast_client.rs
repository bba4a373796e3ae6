//! Client for the KMA solar-generation forecast service, one request per base (issue) date.

use crate::cache::partition::PartitionKey;
use crate::clients::RecordSource;
use crate::fetch::delay::DelayRange;
use crate::fetch::error::FetchError;
use crate::fetch::paged::FetchOutcome;
use crate::types::calendar::{DateRange, Month};
use crate::types::data_source::{DataSource, Horizon, Region};
use crate::types::forecast::{ForecastRecord, RawForecast};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;

pub const FORECAST_URL: &str = "https://bd.kma.go.kr/kma2020/energy/energyGeneration.do";

/// Forecast-time marker sent with every request.
pub const DEFAULT_FORECAST_TIME: &str = "1000";

/// What one base-date request produced.
#[derive(Debug)]
pub(crate) enum DayResponse<T> {
    Records(Vec<T>),
    HttpStatus(StatusCode),
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    result: Option<Value>,
}

/// Parses the `result` array of one base-date response. A missing or non-array `result` is an
/// empty day.
pub(crate) fn parse_day(text: &str) -> Result<Vec<RawForecast>, serde_json::Error> {
    let response: ForecastResponse = serde_json::from_str(text)?;
    match response.result {
        Some(result @ Value::Array(_)) => serde_json::from_value(result),
        _ => Ok(Vec::new()),
    }
}

/// Requests every day in `days` in order. A day answered with an HTTP error is skipped; the
/// first such day is reported through [`FetchOutcome::Partial`] (`failed_page` is the 1-based
/// request number). Decode and network errors abort the walk.
pub(crate) async fn collect_days<T, F, Fut>(
    days: impl Iterator<Item = NaiveDate>,
    mut fetch_day: F,
) -> Result<FetchOutcome<T>, FetchError>
where
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<DayResponse<T>, FetchError>>,
{
    let mut items = Vec::new();
    let mut first_failure: Option<(StatusCode, u32)> = None;
    for (request_no, day) in (1u32..).zip(days) {
        match fetch_day(day).await? {
            DayResponse::Records(records) => {
                if records.is_empty() {
                    info!("No forecast records for base date {}", day);
                }
                items.extend(records);
            }
            DayResponse::HttpStatus(status) => {
                warn!("Failed to retrieve forecast for base date {}: {}", day, status);
                first_failure.get_or_insert((status, request_no));
            }
        }
    }

    Ok(match (items.is_empty(), first_failure) {
        (true, _) => FetchOutcome::NoData,
        (false, Some((status, failed_page))) => FetchOutcome::Partial {
            items,
            status,
            failed_page,
        },
        (false, None) => FetchOutcome::Complete(items),
    })
}

/// Base dates to request for `window`: the day before it, whose next-day forecast targets the
/// window's first day, through the window's last day.
pub(crate) fn base_dates(window: DateRange) -> impl Iterator<Item = NaiveDate> {
    let first = window
        .start()
        .checked_sub_days(Days::new(1))
        .unwrap_or(window.start());
    first.iter_days().take_while(move |day| *day <= window.end())
}

/// Normalises raw records for `region` and keeps those whose forecast date lies in `window`, so
/// nothing spills into a neighbouring month's partition.
pub(crate) fn records_in_window(raw: Vec<RawForecast>, region: &Region, window: &DateRange) -> Vec<ForecastRecord> {
    raw.into_iter()
        .filter_map(|r| r.normalize(region))
        .filter(|record| window.contains(record.forecast_date))
        .collect()
}

/// Fetches solar-irradiance forecasts for a region, splitting them into same-day and next-day
/// records as they arrive.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: Client,
    base_url: String,
    forecast_time: String,
    throttle: DelayRange,
}

impl ForecastClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        forecast_time: impl Into<String>,
        throttle: DelayRange,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            forecast_time: forecast_time.into(),
            throttle,
        }
    }

    async fn fetch_day(
        &self,
        region: &Region,
        base_date: NaiveDate,
    ) -> Result<DayResponse<RawForecast>, FetchError> {
        let base = base_date.format("%Y%m%d").to_string();
        let params = [
            ("baseDate", base.as_str()),
            ("fcstTime", self.forecast_time.as_str()),
            ("regCd", region.code()),
        ];
        let url = format!("{} (region {}, base date {})", self.base_url, region.code(), base);
        debug!("Requesting {}", url);

        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;
        let status = response.status();
        if !status.is_success() {
            return Ok(DayResponse::HttpStatus(status));
        }
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;
        parse_day(&text)
            .map(DayResponse::Records)
            .map_err(|source| FetchError::Decode { url, source })
    }

    /// Fetches the forecasts whose target date lies in `window`, one request per
    /// [`base_dates`] entry.
    pub async fn forecasts(
        &self,
        region: &Region,
        window: DateRange,
    ) -> Result<FetchOutcome<ForecastRecord>, FetchError> {
        info!(
            "Fetching forecasts for region {} ({}) from {}",
            region.code(),
            region.name(),
            window
        );
        let outcome = collect_days(base_dates(window), |day| self.fetch_day(region, day)).await?;
        Ok(outcome.map_items(|raw| records_in_window(raw, region, &window)))
    }
}

impl RecordSource for ForecastClient {
    type Key = Region;
    type Record = ForecastRecord;

    fn cache_key(&self, region: &Region) -> String {
        region.code().to_string()
    }

    fn partitions(&self, region: &Region, month: Month) -> Vec<PartitionKey> {
        Horizon::ALL
            .iter()
            .map(|horizon| PartitionKey::new(DataSource::Forecast(*horizon), region.code(), month))
            .collect()
    }

    fn throttle(&self) -> DelayRange {
        self.throttle
    }

    async fn fetch(
        &self,
        region: &Region,
        window: DateRange,
    ) -> Result<FetchOutcome<ForecastRecord>, FetchError> {
        self.forecasts(region, window).await
    }
}
