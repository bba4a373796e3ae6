use crate::cache::error::CacheError;
use crate::cache::partition::{PartitionKey, PartitionStore};
use crate::types::calendar::Month;
use log::{debug, info};

/// Decides per partition whether a month has to be fetched.
///
/// A partition file that exists is taken as complete, without checking its rows. Only months
/// strictly before the `reference` month (the run's "now") are final; the reference month and any
/// later month are always refetched so they keep accumulating.
#[derive(Debug, Clone)]
pub struct GapDetector {
    store: PartitionStore,
    reference: Month,
}

impl GapDetector {
    pub fn new(store: PartitionStore, reference: Month) -> Self {
        Self { store, reference }
    }

    /// Whether the partition file is present on disk.
    pub async fn exists(&self, partition: &PartitionKey) -> Result<bool, CacheError> {
        let path = self.store.path_of(partition);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| CacheError::Read(path, e))
    }

    pub async fn should_fetch(&self, partition: &PartitionKey) -> Result<bool, CacheError> {
        if partition.month >= self.reference {
            debug!("{} is not finalised yet, refetching", partition);
            return Ok(true);
        }
        if self.exists(partition).await? {
            info!("Skipping {}: already cached", partition);
            Ok(false)
        } else {
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::partition::DedupPolicy;
    use crate::types::data_source::DataSource;
    use tempfile::TempDir;

    fn station_146_july() -> PartitionKey {
        PartitionKey::new(DataSource::GroundTruth, "146", Month::new(2024, 7).unwrap())
    }

    fn touch(store: &PartitionStore, partition: &PartitionKey) {
        let path = store.path_of(partition);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "\u{feff}station_id\n").unwrap();
    }

    #[tokio::test]
    async fn test_missing_partition_is_fetched() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), DedupPolicy::KeepAll);
        let detector = GapDetector::new(store, Month::new(2025, 1).unwrap());
        assert!(!detector.exists(&station_146_july()).await.unwrap());
        assert!(detector.should_fetch(&station_146_july()).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_past_partition_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), DedupPolicy::KeepAll);
        touch(&store, &station_146_july());
        let detector = GapDetector::new(store, Month::new(2025, 1).unwrap());
        assert!(!detector.should_fetch(&station_146_july()).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_current_month_is_refetched() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), DedupPolicy::KeepAll);
        touch(&store, &station_146_july());
        let detector = GapDetector::new(store, Month::new(2024, 7).unwrap());
        assert!(detector.exists(&station_146_july()).await.unwrap());
        assert!(detector.should_fetch(&station_146_july()).await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_month_after_reference_is_refetched() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path(), DedupPolicy::KeepAll);
        touch(&store, &station_146_july());
        let detector = GapDetector::new(store, Month::new(2024, 6).unwrap());
        assert!(detector.exists(&station_146_july()).await.unwrap());
        assert!(detector.should_fetch(&station_146_july()).await.unwrap());
    }
}
