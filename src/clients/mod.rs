pub mod asos_client;
pub mod forecast_client;

use crate::cache::partition::PartitionKey;
use crate::cache::rows::PartitionRecord;
use crate::fetch::delay::DelayRange;
use crate::fetch::error::FetchError;
use crate::fetch::paged::FetchOutcome;
use crate::types::calendar::{DateRange, Month};
use std::future::Future;

/// An upstream service that can be synced month by month into the cache.
pub trait RecordSource {
    /// What identifies one series upstream (a station id, a forecast region).
    type Key: Send + Sync;
    type Record: PartitionRecord;

    /// The directory key a series is cached under.
    fn cache_key(&self, key: &Self::Key) -> String;

    /// Every partition one month of this series is written to.
    fn partitions(&self, key: &Self::Key, month: Month) -> Vec<PartitionKey>;

    /// Delay inserted after each month's fetch, whatever its outcome.
    fn throttle(&self) -> DelayRange;

    /// Fetches and normalises every record of `key` within `window`.
    fn fetch(
        &self,
        key: &Self::Key,
        window: DateRange,
    ) -> impl Future<Output = Result<FetchOutcome<Self::Record>, FetchError>> + Send;
}
