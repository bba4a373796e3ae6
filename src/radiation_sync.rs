//! The main entry point: syncs ground-truth observations and forecasts into the local cache and
//! reconciles them for evaluation.

use crate::cache::consolidate::CacheConsolidator;
use crate::cache::partition::PartitionStore;
use crate::clients::asos_client::AsosClient;
use crate::clients::forecast_client::ForecastClient;
use crate::config::SyncConfig;
use crate::error::RadiationSyncError;
use crate::fetch::delay::TokioSleeper;
use crate::fetch::error::FetchError;
use crate::fetch::paged::PagedFetcher;
use crate::reconcile::snapshot::to_dataframe;
use crate::reconcile::Reconciler;
use crate::sync::{SyncDriver, SyncReport};
use crate::types::calendar::{DateRange, Month};
use crate::types::data_source::{DataSource, Horizon, Region};
use crate::types::forecast::ForecastRecord;
use crate::types::observation::Observation;
use crate::types::reconciled::ReconciledPair;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::{Local, NaiveDate};
use log::info;
use polars::prelude::{DataFrame, LazyFrame};
use reqwest::Client;
use std::path::Path;

/// Validates `start <= end` and builds the inclusive range.
fn date_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, RadiationSyncError> {
    DateRange::new(start, end).ok_or(RadiationSyncError::InvalidDateRange { start, end })
}

/// Incremental fetch-cache-reconcile client for KMA solar data.
///
/// Ground truth comes from the ASOS hourly observation service, forecasts from the solar
/// generation forecast service. Both are cached as monthly CSV partitions below the cache root;
/// months already on disk are skipped except the reference ("current") month.
///
/// # Examples
///
/// ```no_run
/// # use radiation_sync::{RadiationSync, RadiationSyncError, SyncConfig};
/// # use chrono::NaiveDate;
/// # #[tokio::main]
/// # async fn main() -> Result<(), RadiationSyncError> {
/// let client = RadiationSync::new(SyncConfig::from_env()?).await?;
///
/// let report = client
///     .sync_observations()
///     .stations(&["146".to_string()])
///     .start(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
///     .end(NaiveDate::from_ymd_opt(2024, 7, 17).unwrap())
///     .call()
///     .await?;
/// println!("{} month(s) cached, {} skipped", report.cached(), report.skipped());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RadiationSync {
    config: SyncConfig,
    store: PartitionStore,
    consolidator: CacheConsolidator,
    reference: Month,
    asos: AsosClient,
    forecast: ForecastClient,
}

#[bon]
impl RadiationSync {
    /// Creates the client: resolves and creates the cache root and builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`RadiationSyncError::CacheDirResolution`] if no cache root was configured and the
    /// platform cache directory is unknown, [`RadiationSyncError::CacheDirCreation`] if the root
    /// cannot be created, and [`RadiationSyncError::Fetch`] if the HTTP client cannot be built.
    pub async fn new(config: SyncConfig) -> Result<Self, RadiationSyncError> {
        let cache_dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => get_cache_dir().map_err(RadiationSyncError::CacheDirResolution)?,
        };
        ensure_cache_dir_exists(&cache_dir)
            .await
            .map_err(|e| RadiationSyncError::CacheDirCreation(cache_dir.clone(), e))?;

        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        let reference = config
            .reference_month
            .unwrap_or_else(|| Month::of(Local::now().date_naive()));
        info!(
            "Using cache at {} with reference month {}",
            cache_dir.display(),
            reference
        );

        let store = PartitionStore::new(cache_dir, config.dedup);
        let asos = AsosClient::new(
            http.clone(),
            config.asos_url.clone(),
            config.service_key.clone(),
            (config.start_hour.clone(), config.end_hour.clone()),
            PagedFetcher::new(config.page_size),
            config.asos_throttle,
        );
        let forecast = ForecastClient::new(
            http,
            config.forecast_url.clone(),
            config.forecast_time.clone(),
            config.forecast_throttle,
        );
        Ok(Self {
            consolidator: CacheConsolidator::new(store.clone()),
            store,
            reference,
            asos,
            forecast,
            config,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        self.store.root()
    }

    /// The month treated as "now": always refetched, excluded from finalised views.
    pub fn reference_month(&self) -> Month {
        self.reference
    }

    /// Fetches and caches hourly observations for each station over `start..=end`, month by
    /// month, skipping months already cached.
    ///
    /// # Errors
    ///
    /// [`RadiationSyncError::InvalidDateRange`] for `start > end`; [`RadiationSyncError::Cache`]
    /// when the cache cannot be written. Upstream failures do not error, they are reported per
    /// month in the returned [`SyncReport`].
    #[builder]
    pub async fn sync_observations(
        &self,
        stations: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SyncReport, RadiationSyncError> {
        let range = date_range(start, end)?;
        let driver = SyncDriver::new(
            self.asos.clone(),
            self.store.clone(),
            self.reference,
            self.config.retry_policy(),
            TokioSleeper,
        );
        Ok(driver.run(stations, range).await?)
    }

    /// Fetches and caches same-day and next-day forecasts for each region over `start..=end`.
    #[builder]
    pub async fn sync_forecasts(
        &self,
        regions: &[Region],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SyncReport, RadiationSyncError> {
        let range = date_range(start, end)?;
        let driver = SyncDriver::new(
            self.forecast.clone(),
            self.store.clone(),
            self.reference,
            self.config.retry_policy(),
            TokioSleeper,
        );
        Ok(driver.run(regions, range).await?)
    }

    /// Cached observations of `station` with timestamps inside `start..=end`.
    #[builder]
    pub async fn observations(
        &self,
        station: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, RadiationSyncError> {
        let range = date_range(start, end)?;
        let files = self
            .consolidator
            .covering(DataSource::GroundTruth, station, &range)
            .await?;
        let mut records = self.consolidator.load::<Observation>(&files).await?.records;
        records.retain(|record| range.contains_datetime(record.timestamp));
        Ok(records)
    }

    /// Cached forecasts of one horizon for `region_code` targeting `start..=end`.
    #[builder]
    pub async fn forecasts(
        &self,
        region_code: &str,
        horizon: Horizon,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ForecastRecord>, RadiationSyncError> {
        let range = date_range(start, end)?;
        let code = Region::new(region_code, "").code().to_string();
        let files = self
            .consolidator
            .covering(DataSource::Forecast(horizon), &code, &range)
            .await?;
        let mut records = self.consolidator.load::<ForecastRecord>(&files).await?.records;
        records.retain(|record| range.contains_datetime(record.timestamp()));
        Ok(records)
    }

    /// Every finalised partition of `(source, key)`, the reference month excluded, as one
    /// `LazyFrame`.
    #[builder]
    pub async fn finalized_frame(
        &self,
        source: DataSource,
        key: &str,
    ) -> Result<LazyFrame, RadiationSyncError> {
        let files = self
            .consolidator
            .finalized(source, key, self.reference)
            .await?;
        info!("Consolidating {} partition(s) of {}/{}", files.len(), source, key);
        Ok(self.consolidator.frame(&files)?)
    }

    /// Joins the cached observations of `station` with the cached forecasts of `region_code`
    /// for one horizon, restricted to `start..=end`.
    #[builder]
    pub async fn reconcile(
        &self,
        station: &str,
        region_code: &str,
        horizon: Horizon,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ReconciledPair>, RadiationSyncError> {
        let range = date_range(start, end)?;
        let observations = self
            .observations()
            .station(station)
            .start(start)
            .end(end)
            .call()
            .await?;
        let forecasts = self
            .forecasts()
            .region_code(region_code)
            .horizon(horizon)
            .start(start)
            .end(end)
            .call()
            .await?;
        let pairs = Reconciler.reconcile_within(&observations, &forecasts, &range);
        info!(
            "Reconciled {} observation(s) and {} {} forecast(s) into {} pair(s)",
            observations.len(),
            forecasts.len(),
            horizon,
            pairs.len()
        );
        Ok(pairs)
    }

    /// [`reconcile`](Self::reconcile) as a `DataFrame`, one row per pair.
    #[builder]
    pub async fn reconciled_frame(
        &self,
        station: &str,
        region_code: &str,
        horizon: Horizon,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame, RadiationSyncError> {
        let pairs = self
            .reconcile()
            .station(station)
            .region_code(region_code)
            .horizon(horizon)
            .start(start)
            .end(end)
            .call()
            .await?;
        Ok(to_dataframe(&pairs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::partition::DedupPolicy;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    async fn client(dir: &TempDir) -> RadiationSync {
        let config = SyncConfig::builder()
            .service_key("test")
            .cache_dir(dir.path().join("cache"))
            .reference_month(Month::new(2025, 1).unwrap())
            .build();
        RadiationSync::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_new_creates_cache_root() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir).await;
        assert!(client.cache_dir().is_dir());
        assert_eq!(client.reference_month(), Month::new(2025, 1).unwrap());
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir).await;
        let result = client
            .sync_observations()
            .stations(&["146".to_string()])
            .start(date(10))
            .end(date(1))
            .call()
            .await;
        assert!(matches!(result, Err(RadiationSyncError::InvalidDateRange { .. })));
    }

    #[tokio::test]
    async fn test_reconcile_reads_both_caches() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir).await;
        let at_ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let store = PartitionStore::new(client.cache_dir(), DedupPolicy::KeepAll);
        store
            .write(
                "146",
                vec![Observation {
                    station_id: "146".to_string(),
                    station_name: "Jeonju".to_string(),
                    timestamp: date(12).and_time(at_ten),
                    irradiance: Some(1.5),
                    temperature: Some(28.0),
                    wind_speed: Some(1.0),
                }],
            )
            .await
            .unwrap();
        store
            .write(
                "4511300000",
                vec![ForecastRecord {
                    region_code: "4511300000".to_string(),
                    region_name: "Jeonju".to_string(),
                    base_date: date(11),
                    forecast_date: date(12),
                    forecast_time: at_ten,
                    horizon: Horizon::NextDay,
                    irradiance: Some(400.0),
                    temperature: Some(27.0),
                    wind_speed: Some(2.0),
                }],
            )
            .await
            .unwrap();

        let pairs = client
            .reconcile()
            .station("146")
            .region_code("4511300")
            .horizon(Horizon::NextDay)
            .start(date(1))
            .end(date(31))
            .call()
            .await
            .unwrap();
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].forecast_irradiance - 1.44).abs() < 1e-12);

        let same_day = client
            .reconcile()
            .station("146")
            .region_code("4511300")
            .horizon(Horizon::SameDay)
            .start(date(1))
            .end(date(31))
            .call()
            .await
            .unwrap();
        assert!(same_day.is_empty());

        let frame = client
            .finalized_frame()
            .source(DataSource::GroundTruth)
            .key("146")
            .call()
            .await
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(frame.height(), 1);

        let joined = client
            .reconciled_frame()
            .station("146")
            .region_code("4511300000")
            .horizon(Horizon::NextDay)
            .start(date(12))
            .end(date(12))
            .call()
            .await
            .unwrap();
        assert_eq!(joined.height(), 1);
    }
}
