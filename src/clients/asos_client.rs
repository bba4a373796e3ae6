//! Client for the KMA ASOS hourly observation service (ground truth).

use crate::cache::partition::PartitionKey;
use crate::clients::RecordSource;
use crate::fetch::delay::DelayRange;
use crate::fetch::error::FetchError;
use crate::fetch::paged::{FetchOutcome, PageResponse, PageSource, PagedFetcher};
use crate::types::calendar::{DateRange, Month};
use crate::types::data_source::DataSource;
use crate::types::observation::{Observation, RawObservation};
use crate::types::values;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

pub const ASOS_URL: &str = "https://apis.data.go.kr/1360000/AsosHourlyInfoService/getWthrDataList";

#[derive(Debug, Deserialize)]
struct Envelope {
    response: EnvelopeResponse,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse {
    header: Option<EnvelopeHeader>,
    body: Option<EnvelopeBody>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeHeader {
    #[serde(rename = "resultCode")]
    result_code: Option<String>,
    #[serde(rename = "resultMsg")]
    result_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    // An empty result comes back as `"items": ""`, so this stays loose.
    items: Option<Value>,
    #[serde(rename = "totalCount")]
    total_count: Option<Value>,
}

/// Parses one page of the response envelope (`response.body.items.item[]` plus `totalCount`).
///
/// A response without the nested `item` array is [`PageResponse::MissingItems`].
pub(crate) fn parse_page(text: &str) -> Result<PageResponse<RawObservation>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if let Some(header) = &envelope.response.header {
        debug!(
            "ASOS result code {}: {}",
            header.result_code.as_deref().unwrap_or("?"),
            header.result_msg.as_deref().unwrap_or("")
        );
    }
    let Some(body) = envelope.response.body else {
        return Ok(PageResponse::MissingItems);
    };
    let Some(item) = body.items.and_then(|mut items| items.get_mut("item").map(Value::take)) else {
        return Ok(PageResponse::MissingItems);
    };
    let items: Vec<RawObservation> = match item {
        Value::Array(_) => serde_json::from_value(item)?,
        // A single row can be returned as a bare object.
        Value::Object(_) => vec![serde_json::from_value(item)?],
        _ => return Ok(PageResponse::MissingItems),
    };
    let total_count = values::number(body.total_count.as_ref())
        .map(|total| total.max(0.0) as u64)
        .unwrap_or(items.len() as u64);
    Ok(PageResponse::Page { items, total_count })
}

/// Fetches hourly observations for one station per call, page by page.
#[derive(Debug, Clone)]
pub struct AsosClient {
    http: Client,
    base_url: String,
    service_key: String,
    start_hour: String,
    end_hour: String,
    fetcher: PagedFetcher,
    throttle: DelayRange,
}

impl AsosClient {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        hours: (String, String),
        fetcher: PagedFetcher,
        throttle: DelayRange,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            service_key: service_key.into(),
            start_hour: hours.0,
            end_hour: hours.1,
            fetcher,
            throttle,
        }
    }

    /// Fetches every page for `station` over `window` and normalises the rows. Rows without a
    /// usable timestamp are dropped with a warning.
    pub async fn observations(
        &self,
        station: &str,
        window: DateRange,
    ) -> Result<FetchOutcome<Observation>, FetchError> {
        info!("Fetching ASOS observations for station {} from {}", station, window);
        let query = AsosQuery {
            client: self,
            station,
            window,
        };
        let outcome = self.fetcher.fetch_all(&query).await?;
        Ok(outcome.map_items(|raw| {
            let fetched = raw.len();
            let records: Vec<Observation> = raw.into_iter().filter_map(|r| r.normalize(station)).collect();
            if records.len() < fetched {
                warn!(
                    "Dropped {} ASOS row(s) without a usable timestamp for station {}",
                    fetched - records.len(),
                    station
                );
            }
            records
        }))
    }
}

impl RecordSource for AsosClient {
    type Key = String;
    type Record = Observation;

    fn cache_key(&self, station: &String) -> String {
        station.clone()
    }

    fn partitions(&self, station: &String, month: Month) -> Vec<PartitionKey> {
        vec![PartitionKey::new(DataSource::GroundTruth, station.as_str(), month)]
    }

    fn throttle(&self) -> DelayRange {
        self.throttle
    }

    async fn fetch(
        &self,
        station: &String,
        window: DateRange,
    ) -> Result<FetchOutcome<Observation>, FetchError> {
        self.observations(station, window).await
    }
}

/// One station and date window, bound for pagination.
struct AsosQuery<'a> {
    client: &'a AsosClient,
    station: &'a str,
    window: DateRange,
}

impl PageSource for AsosQuery<'_> {
    type Item = RawObservation;

    async fn fetch_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> Result<PageResponse<RawObservation>, FetchError> {
        let client = self.client;
        let start = self.window.start().format("%Y%m%d").to_string();
        let end = self.window.end().format("%Y%m%d").to_string();
        let page_size = page_size.to_string();
        let page_no_text = page_no.to_string();
        let params = [
            ("serviceKey", client.service_key.as_str()),
            ("numOfRows", page_size.as_str()),
            ("pageNo", page_no_text.as_str()),
            ("dataType", "JSON"),
            ("dataCd", "ASOS"),
            ("dateCd", "HR"),
            ("startDt", start.as_str()),
            ("startHh", client.start_hour.as_str()),
            ("endDt", end.as_str()),
            ("endHh", client.end_hour.as_str()),
            ("stnIds", self.station),
        ];

        let url = format!("{} (station {}, page {})", client.base_url, self.station, page_no);
        debug!("Requesting {}", url);
        let response = client
            .http
            .get(&client.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(PageResponse::HttpStatus(status));
        }
        let text = response
            .text()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.clone(), e))?;
        parse_page(&text).map_err(|source| FetchError::Decode { url, source })
    }
}
