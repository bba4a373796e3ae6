//! Month-by-month driver: decides per (key, month) whether to fetch, fetches with retry,
//! and merges the result into the cache.

use crate::cache::error::CacheError;
use crate::cache::gap::GapDetector;
use crate::cache::partition::{PartitionKey, PartitionStore};
use crate::cache::rows::PartitionRecord;
use crate::clients::RecordSource;
use crate::fetch::delay::{Sleeper, TokioSleeper};
use crate::fetch::retry::{RetryOutcome, RetryPolicy};
use crate::types::calendar::{DateRange, Month};
use log::{debug, error, info, warn};
use std::fmt;

/// Why a fetched month left nothing in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// The upstream had nothing (no items field, no rows, or the first request failed).
    NoData,
    /// Every attempt failed to decode.
    RetriesExhausted { attempts: u32 },
    /// A non-retried failure, typically a network error.
    Aborted { message: String },
}

/// Final state of one (key, month) unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthState {
    /// All partitions were already cached.
    Skipped,
    /// Rows were fetched and merged; `partial` when an HTTP error cut the fetch short.
    Cached { rows: usize, partial: bool },
    /// Fetched, but nothing was written.
    Empty { reason: EmptyReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthOutcome {
    pub key: String,
    pub month: Month,
    pub state: MonthState,
}

impl fmt::Display for MonthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.key, self.month)?;
        match &self.state {
            MonthState::Skipped => write!(f, "skipped"),
            MonthState::Cached { rows, partial: false } => write!(f, "cached {} row(s)", rows),
            MonthState::Cached { rows, partial: true } => write!(f, "cached {} row(s) (partial)", rows),
            MonthState::Empty { reason } => match reason {
                EmptyReason::NoData => write!(f, "empty (no data)"),
                EmptyReason::RetriesExhausted { attempts } => {
                    write!(f, "empty (gave up after {} attempts)", attempts)
                }
                EmptyReason::Aborted { message } => write!(f, "empty ({})", message),
            },
        }
    }
}

/// Everything a [`SyncDriver::run`] did, one entry per (key, month) in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<MonthOutcome>,
}

impl SyncReport {
    pub fn skipped(&self) -> usize {
        self.count(|state| matches!(state, MonthState::Skipped))
    }

    pub fn cached(&self) -> usize {
        self.count(|state| matches!(state, MonthState::Cached { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|state| matches!(state, MonthState::Empty { .. }))
    }

    /// Rows written across the whole run.
    pub fn rows(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome.state {
                MonthState::Cached { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&MonthState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }
}

/// Walks keys and months sequentially; one upstream unit is in flight at a time.
#[derive(Debug)]
pub struct SyncDriver<C, S = TokioSleeper> {
    source: C,
    store: PartitionStore,
    gaps: GapDetector,
    retry: RetryPolicy,
    sleeper: S,
}

impl<C, S> SyncDriver<C, S>
where
    C: RecordSource,
    S: Sleeper,
{
    /// `reference` is the run's current month; it and later months are always refetched.
    pub fn new(source: C, store: PartitionStore, reference: Month, retry: RetryPolicy, sleeper: S) -> Self {
        let gaps = GapDetector::new(store.clone(), reference);
        Self {
            source,
            store,
            gaps,
            retry,
            sleeper,
        }
    }

    /// Syncs every month intersecting `range` for every key. Fetch failures end up in the report;
    /// cache (filesystem) errors abort the run.
    pub async fn run(&self, keys: &[C::Key], range: DateRange) -> Result<SyncReport, CacheError> {
        let mut report = SyncReport::default();
        for key in keys {
            let cache_key = self.source.cache_key(key);
            for month in range.months() {
                let Some(window) = range.clip_to(month) else {
                    continue;
                };
                let state = self.sync_month(key, &cache_key, month, window).await?;
                let outcome = MonthOutcome {
                    key: cache_key.clone(),
                    month,
                    state,
                };
                debug!("{}", outcome);
                report.outcomes.push(outcome);
            }
        }
        info!(
            "Sync finished: {} cached, {} skipped, {} empty, {} row(s) written",
            report.cached(),
            report.skipped(),
            report.empty(),
            report.rows()
        );
        Ok(report)
    }

    async fn sync_month(
        &self,
        key: &C::Key,
        cache_key: &str,
        month: Month,
        window: DateRange,
    ) -> Result<MonthState, CacheError> {
        let mut needed: Vec<PartitionKey> = Vec::new();
        for partition in self.source.partitions(key, month) {
            if self.gaps.should_fetch(&partition).await? {
                needed.push(partition);
            }
        }
        if needed.is_empty() {
            return Ok(MonthState::Skipped);
        }

        let fetched = self
            .retry
            .run(&self.sleeper, |attempt| {
                debug!("Fetching {} {} (attempt {})", cache_key, window, attempt);
                self.source.fetch(key, window)
            })
            .await;

        let state = match fetched {
            RetryOutcome::Success(outcome) => {
                let partial = outcome.is_partial();
                let records: Vec<C::Record> = outcome
                    .into_items()
                    .into_iter()
                    .filter(|record| {
                        let partition = PartitionKey::new(
                            record.source(),
                            cache_key,
                            Month::of(record.timestamp()),
                        );
                        needed.contains(&partition)
                    })
                    .collect();
                if records.is_empty() {
                    warn!("No data for {} {}", cache_key, month);
                    MonthState::Empty {
                        reason: EmptyReason::NoData,
                    }
                } else {
                    if partial {
                        warn!("Caching partial data for {} {}", cache_key, month);
                    }
                    let writes = self.store.write(cache_key, records).await?;
                    MonthState::Cached {
                        rows: writes.iter().map(|w| w.new_rows).sum(),
                        partial,
                    }
                }
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                warn!(
                    "Giving up on {} {} after {} attempts: {}",
                    cache_key, month, attempts, last_error
                );
                MonthState::Empty {
                    reason: EmptyReason::RetriesExhausted { attempts },
                }
            }
            RetryOutcome::Aborted(e) => {
                error!("Fetching {} {} failed: {}", cache_key, month, e);
                MonthState::Empty {
                    reason: EmptyReason::Aborted {
                        message: e.to_string(),
                    },
                }
            }
        };

        let pause = self.source.throttle().sample();
        debug!("Throttling for {:.1} seconds", pause.as_secs_f64());
        self.sleeper.sleep(pause).await;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::partition::DedupPolicy;
    use crate::fetch::delay::DelayRange;
    use crate::fetch::error::FetchError;
    use crate::fetch::paged::FetchOutcome;
    use crate::fetch::testing::{decode_error, network_error, RecordingSleeper};
    use crate::types::data_source::{DataSource, Horizon};
    use crate::types::forecast::ForecastRecord;
    use crate::types::observation::Observation;
    use chrono::{NaiveDate, NaiveTime};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Serves scripted fetch results and records the windows it was asked for.
    struct FakeSource<R> {
        sources: Vec<DataSource>,
        responses: Mutex<VecDeque<Result<FetchOutcome<R>, FetchError>>>,
        windows: Mutex<Vec<DateRange>>,
    }

    impl<R> FakeSource<R> {
        fn new(sources: Vec<DataSource>, responses: Vec<Result<FetchOutcome<R>, FetchError>>) -> Self {
            Self {
                sources,
                responses: Mutex::new(responses.into()),
                windows: Mutex::new(Vec::new()),
            }
        }

        fn windows(&self) -> Vec<DateRange> {
            self.windows.lock().unwrap().clone()
        }
    }

    impl<R: PartitionRecord + Sync> RecordSource for FakeSource<R> {
        type Key = String;
        type Record = R;

        fn cache_key(&self, key: &String) -> String {
            key.clone()
        }

        fn partitions(&self, key: &String, month: Month) -> Vec<PartitionKey> {
            self.sources
                .iter()
                .map(|source| PartitionKey::new(*source, key.as_str(), month))
                .collect()
        }

        fn throttle(&self) -> DelayRange {
            DelayRange::from_secs(5, 15)
        }

        fn fetch(
            &self,
            _key: &String,
            window: DateRange,
        ) -> impl Future<Output = Result<FetchOutcome<R>, FetchError>> + Send {
            self.windows.lock().unwrap().push(window);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(FetchOutcome::NoData));
            std::future::ready(next)
        }
    }

    fn obs(month: u32, day: u32, irradiance: f64) -> Observation {
        Observation {
            station_id: "146".to_string(),
            station_name: "Jeonju".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, month, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            irradiance: Some(irradiance),
            temperature: None,
            wind_speed: None,
        }
    }

    fn range(start: (u32, u32), end: (u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, start.0, start.1).unwrap(),
            NaiveDate::from_ymd_opt(2024, end.0, end.1).unwrap(),
        )
        .unwrap()
    }

    fn july() -> Month {
        Month::new(2024, 7).unwrap()
    }

    fn driver<R: PartitionRecord + Sync>(
        dir: &TempDir,
        source: FakeSource<R>,
        reference: Month,
    ) -> SyncDriver<FakeSource<R>, RecordingSleeper> {
        let store = PartitionStore::new(dir.path(), DedupPolicy::KeepAll);
        SyncDriver::new(source, store, reference, RetryPolicy::default(), RecordingSleeper::default())
    }

    async fn seed_july(dir: &TempDir) {
        PartitionStore::new(dir.path(), DedupPolicy::KeepAll)
            .write("146", vec![obs(7, 1, 0.5)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cached_past_month_is_not_fetched() {
        let dir = TempDir::new().unwrap();
        seed_july(&dir).await;
        let source = FakeSource::<Observation>::new(vec![DataSource::GroundTruth], vec![]);
        let driver = driver(&dir, source, Month::new(2025, 1).unwrap());

        let report = driver.run(&["146".to_string()], range((7, 1), (7, 31))).await.unwrap();

        assert_eq!(report.outcomes[0].state, MonthState::Skipped);
        assert!(driver.source.windows().is_empty());
        assert!(driver.sleeper.calls().is_empty());
    }

    #[tokio::test]
    async fn test_current_month_is_fetched_even_when_cached() {
        let dir = TempDir::new().unwrap();
        seed_july(&dir).await;
        let source = FakeSource::new(
            vec![DataSource::GroundTruth],
            vec![Ok(FetchOutcome::Complete(vec![obs(7, 2, 1.5)]))],
        );
        let driver = driver(&dir, source, july());

        let report = driver.run(&["146".to_string()], range((7, 1), (7, 31))).await.unwrap();

        assert_eq!(
            report.outcomes[0].state,
            MonthState::Cached {
                rows: 1,
                partial: false
            }
        );
        assert_eq!(driver.source.windows().len(), 1);
        let stored: Vec<Observation> = driver
            .store
            .read(&PartitionKey::new(DataSource::GroundTruth, "146", july()))
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_each_month_gets_its_clipped_window_and_a_throttle() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::new(
            vec![DataSource::GroundTruth],
            vec![
                Ok(FetchOutcome::Complete(vec![obs(7, 20, 1.0)])),
                Ok(FetchOutcome::Complete(vec![obs(8, 3, 2.0)])),
            ],
        );
        let driver = driver(&dir, source, Month::new(2025, 1).unwrap());

        let report = driver.run(&["146".to_string()], range((7, 15), (8, 10))).await.unwrap();

        assert_eq!(report.cached(), 2);
        assert_eq!(driver.source.windows(), vec![range((7, 15), (7, 31)), range((8, 1), (8, 10))]);
        let sleeps = driver.sleeper.calls();
        assert_eq!(sleeps.len(), 2);
        assert!(sleeps.iter().all(|d| *d >= Duration::from_secs(5) && *d <= Duration::from_secs(15)));
        assert!(dir.path().join("ASOS/146/2024/07.csv").is_file());
        assert!(dir.path().join("ASOS/146/2024/08.csv").is_file());
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_month_uncached() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::<Observation>::new(
            vec![DataSource::GroundTruth],
            vec![Err(decode_error()), Err(decode_error()), Err(decode_error())],
        );
        let driver = driver(&dir, source, Month::new(2025, 1).unwrap());

        let report = driver.run(&["146".to_string()], range((7, 1), (7, 31))).await.unwrap();

        assert_eq!(
            report.outcomes[0].state,
            MonthState::Empty {
                reason: EmptyReason::RetriesExhausted { attempts: 3 }
            }
        );
        // two backoffs, then the throttle
        assert_eq!(driver.sleeper.calls().len(), 3);
        assert!(!dir.path().join("ASOS/146/2024/07.csv").exists());
    }

    #[tokio::test]
    async fn test_network_error_marks_month_empty_and_run_continues() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::new(
            vec![DataSource::GroundTruth],
            vec![Err(network_error()), Ok(FetchOutcome::Complete(vec![obs(8, 1, 1.0)]))],
        );
        let driver = driver(&dir, source, Month::new(2025, 1).unwrap());

        let report = driver.run(&["146".to_string()], range((7, 1), (8, 31))).await.unwrap();

        assert!(matches!(
            report.outcomes[0].state,
            MonthState::Empty {
                reason: EmptyReason::Aborted { .. }
            }
        ));
        assert_eq!(report.outcomes[1].state, MonthState::Cached { rows: 1, partial: false });
    }

    #[tokio::test]
    async fn test_only_horizons_needing_a_fetch_are_written() {
        let dir = TempDir::new().unwrap();
        let base = NaiveDate::from_ymd_opt(2024, 7, 11).unwrap();
        let record = |forecast_day: u32, irradiance: f64| {
            let forecast_date = NaiveDate::from_ymd_opt(2024, 7, forecast_day).unwrap();
            ForecastRecord {
                region_code: "4511300000".to_string(),
                region_name: "Jeonju".to_string(),
                base_date: base,
                forecast_date,
                forecast_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                horizon: Horizon::classify(base, forecast_date),
                irradiance: Some(irradiance),
                temperature: None,
                wind_speed: None,
            }
        };
        let store = PartitionStore::new(dir.path(), DedupPolicy::KeepAll);
        store.write("4511300000", vec![record(11, 100.0)]).await.unwrap();

        let source = FakeSource::new(
            vec![DataSource::Forecast(Horizon::SameDay), DataSource::Forecast(Horizon::NextDay)],
            vec![Ok(FetchOutcome::Complete(vec![record(11, 999.0), record(12, 400.0)]))],
        );
        let driver = driver(&dir, source, Month::new(2025, 1).unwrap());
        let report = driver
            .run(&["4511300000".to_string()], range((7, 1), (7, 31)))
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].state, MonthState::Cached { rows: 1, partial: false });
        let same_day: Vec<ForecastRecord> = store
            .read(&PartitionKey::new(DataSource::Forecast(Horizon::SameDay), "4511300000", july()))
            .await
            .unwrap();
        assert_eq!(same_day.len(), 1);
        assert_eq!(same_day[0].irradiance, Some(100.0));
        let next_day: Vec<ForecastRecord> = store
            .read(&PartitionKey::new(DataSource::Forecast(Horizon::NextDay), "4511300000", july()))
            .await
            .unwrap();
        assert_eq!(next_day.len(), 1);
    }

    #[test]
    fn test_report_counts() {
        let outcome = |state| MonthOutcome {
            key: "146".to_string(),
            month: july(),
            state,
        };
        let report = SyncReport {
            outcomes: vec![
                outcome(MonthState::Skipped),
                outcome(MonthState::Cached { rows: 10, partial: true }),
                outcome(MonthState::Empty {
                    reason: EmptyReason::NoData,
                }),
            ],
        };
        assert_eq!((report.skipped(), report.cached(), report.empty()), (1, 1, 1));
        assert_eq!(report.rows(), 10);
        assert_eq!(report.outcomes[1].to_string(), "146 2024-07: cached 10 row(s) (partial)");
    }
}
