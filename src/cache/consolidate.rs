//! Gathers the partition files of one source and key into a single view.
//!
//! No de-duplication happens here: duplicate rows stored under
//! [`DedupPolicy::KeepAll`](crate::cache::partition::DedupPolicy::KeepAll) come back as they are.
//! Rows that cannot be decoded are skipped and counted rather than failing the gather.

use crate::cache::error::CacheError;
use crate::cache::partition::{read_partition_lenient, PartitionKey, PartitionRows, PartitionStore};
use crate::cache::rows::PartitionRecord;
use crate::types::calendar::{DateRange, Month};
use crate::types::data_source::DataSource;
use log::{debug, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::task;

/// One partition file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFile {
    pub partition: PartitionKey,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheConsolidator {
    store: PartitionStore,
}

impl CacheConsolidator {
    pub fn new(store: PartitionStore) -> Self {
        Self { store }
    }

    /// Every partition file for `(source, key)`, oldest month first.
    pub async fn partitions(&self, source: DataSource, key: &str) -> Result<Vec<PartitionFile>, CacheError> {
        let key_dir = self.store.key_dir(source, key);
        let key = key.to_string();
        task::spawn_blocking(move || list_partitions(&key_dir, source, &key)).await?
    }

    /// Partitions whose month lies strictly before `reference`, i.e. the finalised slices.
    pub async fn finalized(
        &self,
        source: DataSource,
        key: &str,
        reference: Month,
    ) -> Result<Vec<PartitionFile>, CacheError> {
        let mut files = self.partitions(source, key).await?;
        files.retain(|file| file.partition.month < reference);
        Ok(files)
    }

    /// Partitions whose month intersects `range`, the current month included.
    pub async fn covering(
        &self,
        source: DataSource,
        key: &str,
        range: &DateRange,
    ) -> Result<Vec<PartitionFile>, CacheError> {
        let mut files = self.partitions(source, key).await?;
        files.retain(|file| range.intersects(file.partition.month));
        Ok(files)
    }

    /// Loads the rows of `files` as typed records, concatenated in file order. Malformed or
    /// truncated rows are left out and counted in [`PartitionRows::skipped`].
    pub async fn load<R: PartitionRecord>(&self, files: &[PartitionFile]) -> Result<PartitionRows<R>, CacheError> {
        let paths: Vec<PathBuf> = files.iter().map(|file| file.path.clone()).collect();
        let rows = task::spawn_blocking(move || {
            let mut rows = PartitionRows::default();
            for path in &paths {
                rows.extend(read_partition_lenient::<R>(path)?);
            }
            Ok::<_, CacheError>(rows)
        })
        .await??;
        if rows.skipped > 0 {
            warn!(
                "Skipped {} unreadable row(s) across {} partition(s)",
                rows.skipped,
                files.len()
            );
        }
        Ok(rows)
    }

    /// Scans `files` lazily with Polars and stacks them vertically.
    pub fn frame(&self, files: &[PartitionFile]) -> Result<LazyFrame, CacheError> {
        if files.is_empty() {
            return Ok(DataFrame::empty().lazy());
        }
        let frames = files
            .iter()
            .map(|file| {
                LazyCsvReader::new(&file.path)
                    .with_has_header(true)
                    .finish()
                    .map_err(|e| CacheError::CsvScan(file.path.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        concat(
            frames,
            UnionArgs {
                to_supertypes: true,
                ..Default::default()
            },
        )
        .map_err(CacheError::FrameConcat)
    }
}

fn list_partitions(key_dir: &Path, source: DataSource, key: &str) -> Result<Vec<PartitionFile>, CacheError> {
    if !key_dir.is_dir() {
        debug!("No cache directory at {}", key_dir.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for year_entry in read_dir(key_dir)? {
        let year_path = year_entry.path();
        let Some(year) = file_stem_number::<i32>(&year_path, false) else {
            continue;
        };
        if !year_path.is_dir() {
            continue;
        }
        for month_entry in read_dir(&year_path)? {
            let path = month_entry.path();
            let month = file_stem_number::<u32>(&path, true).and_then(|m| Month::new(year, m));
            match month {
                Some(month) if path.is_file() => files.push(PartitionFile {
                    partition: PartitionKey::new(source, key, month),
                    path,
                }),
                _ => warn!("Ignoring unexpected file in cache: {}", path.display()),
            }
        }
    }
    files.sort_by_key(|file| file.partition.month);
    Ok(files)
}

fn read_dir(dir: &Path) -> Result<Vec<std::fs::DirEntry>, CacheError> {
    std::fs::read_dir(dir)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|e| CacheError::DirListing(dir.to_path_buf(), e))
}

/// Parses `2024` (a directory) or `07.csv` (a partition file) into a number.
fn file_stem_number<T: std::str::FromStr>(path: &Path, is_csv: bool) -> Option<T> {
    if is_csv && path.extension().and_then(|e| e.to_str()) != Some("csv") {
        return None;
    }
    let name = if is_csv { path.file_stem()? } else { path.file_name()? };
    name.to_str()?.parse().ok()
}
