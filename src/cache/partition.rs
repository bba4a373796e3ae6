//! Monthly cache partitions: path layout, merge-on-write and reading back.

use crate::cache::error::CacheError;
use crate::cache::rows::PartitionRecord;
use crate::types::calendar::Month;
use crate::types::data_source::DataSource;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Identifies one cache partition file: `{source}/{key}/{year}/{MM}.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub source: DataSource,
    pub key: String,
    pub month: Month,
}

impl PartitionKey {
    pub fn new(source: DataSource, key: impl Into<String>, month: Month) -> Self {
        Self {
            source,
            key: key.into(),
            month,
        }
    }

    /// Path of the partition file relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        let mut path = key_dir(self.source, &self.key);
        path.push(self.month.year().to_string());
        path.push(self.month.file_name());
        path
    }
}

/// Directory holding every year of one `(source, key)`, relative to the cache root.
fn key_dir(source: DataSource, key: &str) -> PathBuf {
    let mut path: PathBuf = source.path_segments().into_iter().collect();
    path.push(key);
    path
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.source, self.key, self.month)
    }
}

/// What to do with rows sharing a timestamp when new rows are merged into a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Append new rows after the stored ones, duplicates included.
    KeepAll,
    /// Keep only the first row per timestamp; previously stored rows win over new ones.
    #[default]
    DropDuplicateTimestamps,
}

/// Summary of one merge into a partition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionWrite {
    pub partition: PartitionKey,
    pub path: PathBuf,
    pub previous_rows: usize,
    /// Stored rows that could not be decoded and were left out of the rewritten file.
    pub unreadable_rows: usize,
    pub new_rows: usize,
    pub stored_rows: usize,
}

/// Rows read from one or more partition files, leaving out rows that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRows<R> {
    pub records: Vec<R>,
    pub skipped: usize,
}

impl<R> Default for PartitionRows<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<R> PartitionRows<R> {
    pub fn extend(&mut self, other: PartitionRows<R>) {
        self.records.extend(other.records);
        self.skipped += other.skipped;
    }
}

/// Writes normalised records into their monthly partition files below a cache root.
#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
    dedup: DedupPolicy,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>, dedup: DedupPolicy) -> Self {
        Self {
            root: root.into(),
            dedup,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, partition: &PartitionKey) -> PathBuf {
        self.root.join(partition.relative_path())
    }

    pub fn key_dir(&self, source: DataSource, key: &str) -> PathBuf {
        self.root.join(key_dir(source, key))
    }

    /// Groups records by the partition they belong to, keeping first-seen partition order and
    /// record order within each partition.
    pub fn group<R: PartitionRecord>(key: &str, records: Vec<R>) -> Vec<(PartitionKey, Vec<R>)> {
        let mut index: HashMap<PartitionKey, usize> = HashMap::new();
        let mut groups: Vec<(PartitionKey, Vec<R>)> = Vec::new();
        for record in records {
            let partition = PartitionKey::new(record.source(), key, Month::of(record.timestamp()));
            match index.get(&partition) {
                Some(&i) => groups[i].1.push(record),
                None => {
                    index.insert(partition.clone(), groups.len());
                    groups.push((partition, vec![record]));
                }
            }
        }
        groups
    }

    /// Merges `records` for `key` into their partitions. Existing rows are loaded first and new
    /// rows appended after them; the store's [`DedupPolicy`] is applied before the file is
    /// atomically replaced. Stored rows that no longer decode (e.g. a truncated last line) are
    /// dropped from the rewritten file.
    pub async fn write<R: PartitionRecord>(
        &self,
        key: &str,
        records: Vec<R>,
    ) -> Result<Vec<PartitionWrite>, CacheError> {
        let mut writes = Vec::new();
        for (partition, group) in Self::group(key, records) {
            let path = self.path_of(&partition);
            let dedup = self.dedup;
            let write = task::spawn_blocking(move || merge_into(partition, path, group, dedup)).await??;
            info!(
                "Cached {} row(s) for {} ({} previously stored, {} now)",
                write.new_rows, write.partition, write.previous_rows, write.stored_rows
            );
            writes.push(write);
        }
        Ok(writes)
    }

    /// Reads every row of one partition. A missing file reads as no rows.
    pub async fn read<R: PartitionRecord>(&self, partition: &PartitionKey) -> Result<Vec<R>, CacheError> {
        let path = self.path_of(partition);
        task::spawn_blocking(move || {
            if path.is_file() {
                read_partition(&path)
            } else {
                Ok(Vec::new())
            }
        })
        .await?
    }
}

fn merge_into<R: PartitionRecord>(
    partition: PartitionKey,
    path: PathBuf,
    new_records: Vec<R>,
    dedup: DedupPolicy,
) -> Result<PartitionWrite, CacheError> {
    let stored = if path.is_file() {
        read_partition_lenient(&path)?
    } else {
        PartitionRows::default()
    };
    if stored.skipped > 0 {
        warn!(
            "Dropping {} unreadable row(s) from {} while merging",
            stored.skipped,
            path.display()
        );
    }
    let unreadable_rows = stored.skipped;
    let mut combined = stored.records;
    let previous_rows = combined.len();
    let new_rows = new_records.len();
    combined.extend(new_records);

    if dedup == DedupPolicy::DropDuplicateTimestamps {
        let mut seen: HashSet<NaiveDateTime> = HashSet::with_capacity(combined.len());
        combined.retain(|record| seen.insert(record.timestamp()));
        debug!(
            "Dropped {} duplicate row(s) in {}",
            previous_rows + new_rows - combined.len(),
            partition
        );
    }

    write_csv_atomic(&path, combined.iter().map(|record| record.to_row()))?;
    Ok(PartitionWrite {
        partition,
        path,
        previous_rows,
        unreadable_rows,
        new_rows,
        stored_rows: combined.len(),
    })
}

fn read_without_bom(path: &Path) -> Result<Vec<u8>, CacheError> {
    let mut bytes = std::fs::read(path).map_err(|e| CacheError::Read(path.to_path_buf(), e))?;
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    Ok(bytes)
}

/// Reads a partition file written by [`write_csv_atomic`], tolerating a leading UTF-8 BOM.
/// Any row that fails to decode fails the whole read.
pub(crate) fn read_partition<R: PartitionRecord>(path: &Path) -> Result<Vec<R>, CacheError> {
    let content = read_without_bom(path)?;
    let mut reader = csv::Reader::from_reader(content.as_slice());
    reader
        .deserialize::<R::Row>()
        .map(|row| {
            let row = row.map_err(|e| CacheError::CsvDecode(path.to_path_buf(), e))?;
            R::from_row(row).map_err(|message| CacheError::InvalidRow {
                path: path.to_path_buf(),
                message,
            })
        })
        .collect()
}

/// Like [`read_partition`], but rows that fail to decode or convert are skipped with a warning
/// and counted. I/O failures still fail the read.
pub(crate) fn read_partition_lenient<R: PartitionRecord>(path: &Path) -> Result<PartitionRows<R>, CacheError> {
    let content = read_without_bom(path)?;
    let mut reader = csv::Reader::from_reader(content.as_slice());
    let mut rows = PartitionRows::default();
    for (line, row) in (2usize..).zip(reader.deserialize::<R::Row>()) {
        let decoded = match row {
            Ok(row) => R::from_row(row),
            Err(e) if e.is_io_error() => return Err(CacheError::CsvDecode(path.to_path_buf(), e)),
            Err(e) => Err(e.to_string()),
        };
        match decoded {
            Ok(record) => rows.records.push(record),
            Err(message) => {
                warn!("Skipping row {} of {}: {}", line, path.display(), message);
                rows.skipped += 1;
            }
        }
    }
    Ok(rows)
}

/// Writes rows as a UTF-8-with-BOM CSV with a header, via a temporary file in the target
/// directory that is renamed over `path` once complete. Missing parent directories are created.
pub(crate) fn write_csv_atomic<S: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = S>,
) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| CacheError::DirCreation(dir.clone(), e))?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(|e| CacheError::Write(dir.clone(), e))?;
    temp.write_all(UTF8_BOM)
        .map_err(|e| CacheError::Write(path.to_path_buf(), e))?;
    {
        let mut writer = csv::Writer::from_writer(&mut temp);
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| CacheError::CsvEncode(path.to_path_buf(), e))?;
        }
        writer
            .flush()
            .map_err(|e| CacheError::Write(path.to_path_buf(), e))?;
    }
    temp.persist(path)
        .map_err(|e| CacheError::Persist(path.to_path_buf(), e))?;
    Ok(())
}
