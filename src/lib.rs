mod cache;
mod clients;
mod config;
mod error;
mod fetch;
mod radiation_sync;
mod reconcile;
mod sync;
mod types;
mod utils;

pub use error::RadiationSyncError;
pub use radiation_sync::*;

pub use config::*;
pub use sync::*;

pub use clients::asos_client::{AsosClient, ASOS_URL};
pub use clients::forecast_client::{ForecastClient, DEFAULT_FORECAST_TIME, FORECAST_URL};
pub use clients::RecordSource;

pub use fetch::delay::{DelayRange, Sleeper, TokioSleeper};
pub use fetch::paged::{page_count, FetchOutcome, PageResponse, PageSource, PagedFetcher, DEFAULT_PAGE_SIZE};
pub use fetch::retry::{RetryOutcome, RetryPolicy};

pub use cache::consolidate::{CacheConsolidator, PartitionFile};
pub use cache::gap::GapDetector;
pub use cache::partition::{DedupPolicy, PartitionKey, PartitionRows, PartitionStore, PartitionWrite};
pub use cache::rows::{ForecastRow, ObservationRow, PartitionRecord};

pub use reconcile::evaluation::{Evaluation, Metric};
pub use reconcile::snapshot::{to_dataframe, write_snapshot};
pub use reconcile::{Reconciler, FORECAST_TO_HOURLY_ENERGY};

pub use types::calendar::{DateRange, Month};
pub use types::data_source::{DataSource, Horizon, Region};
pub use types::forecast::ForecastRecord;
pub use types::observation::Observation;
pub use types::reconciled::ReconciledPair;

pub use cache::error::CacheError;
pub use fetch::error::FetchError;
