//! Run configuration for [`RadiationSync`](crate::RadiationSync).

use crate::cache::partition::DedupPolicy;
use crate::clients::asos_client::ASOS_URL;
use crate::clients::forecast_client::{DEFAULT_FORECAST_TIME, FORECAST_URL};
use crate::error::RadiationSyncError;
use crate::fetch::delay::DelayRange;
use crate::fetch::paged::DEFAULT_PAGE_SIZE;
use crate::fetch::retry::RetryPolicy;
use crate::types::calendar::Month;
use bon::Builder;
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the data.go.kr service key (decoded form).
pub const SERVICE_KEY_VAR: &str = "KMA_SERVICE_KEY";
/// Optional environment variable overriding the cache root.
pub const CACHE_DIR_VAR: &str = "RADIATION_CACHE_DIR";

/// Everything a sync run needs. Only the service key is required; every other field has a
/// default matching the upstream services' expectations.
///
/// # Examples
///
/// ```
/// use radiation_sync::{DedupPolicy, DelayRange, Month, SyncConfig};
///
/// let config = SyncConfig::builder()
///     .service_key("my-key")
///     .cache_dir("/tmp/radiation".into())
///     .asos_throttle(DelayRange::NONE)
///     .dedup(DedupPolicy::KeepAll)
///     .reference_month(Month::new(2024, 7).unwrap())
///     .build();
///
/// assert_eq!(config.page_size, 720);
/// assert_eq!(config.retry_attempts, 3);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SyncConfig {
    #[builder(into)]
    pub service_key: String,
    /// Cache root. Defaults to `radiation_sync_cache` in the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    #[builder(into, default = ASOS_URL.to_string())]
    pub asos_url: String,
    #[builder(into, default = FORECAST_URL.to_string())]
    pub forecast_url: String,
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
    /// Ground-truth hour bounds (`startHh`, `endHh`).
    #[builder(into, default = "00".to_string())]
    pub start_hour: String,
    #[builder(into, default = "23".to_string())]
    pub end_hour: String,
    #[builder(into, default = DEFAULT_FORECAST_TIME.to_string())]
    pub forecast_time: String,
    #[builder(default = 3)]
    pub retry_attempts: u32,
    #[builder(default = DelayRange::from_secs(5, 15))]
    pub retry_backoff: DelayRange,
    #[builder(default = DelayRange::from_secs(5, 15))]
    pub asos_throttle: DelayRange,
    #[builder(default = DelayRange::from_secs(0, 8))]
    pub forecast_throttle: DelayRange,
    #[builder(default = Duration::from_secs(30))]
    pub http_timeout: Duration,
    #[builder(default)]
    pub dedup: DedupPolicy,
    /// The run's "now". Defaults to the local current month when the sync client is created.
    pub reference_month: Option<Month>,
}

impl SyncConfig {
    /// Reads `KMA_SERVICE_KEY` (required) and `RADIATION_CACHE_DIR` (optional), loading a `.env`
    /// file first if one is present. Everything else takes its default.
    pub fn from_env() -> Result<Self, RadiationSyncError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let service_key = std::env::var(SERVICE_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(RadiationSyncError::MissingServiceKey(SERVICE_KEY_VAR))?;
        let cache_dir = std::env::var_os(CACHE_DIR_VAR).map(PathBuf::from);
        Ok(Self::builder()
            .service_key(service_key)
            .maybe_cache_dir(cache_dir)
            .build())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::builder().service_key("key").build();
        assert_eq!(config.asos_url, ASOS_URL);
        assert_eq!(config.forecast_url, FORECAST_URL);
        assert_eq!(config.forecast_time, "1000");
        assert_eq!((config.start_hour.as_str(), config.end_hour.as_str()), ("00", "23"));
        assert_eq!(config.asos_throttle, DelayRange::from_secs(5, 15));
        assert_eq!(config.forecast_throttle, DelayRange::from_secs(0, 8));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.dedup, DedupPolicy::DropDuplicateTimestamps);
        assert!(config.cache_dir.is_none());
        assert!(config.reference_month.is_none());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }
}
