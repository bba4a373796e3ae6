use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to list cache directory '{0}'")]
    DirListing(PathBuf, #[source] std::io::Error),

    #[error("Failed to read cache file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to move temporary file into place at '{0}'")]
    Persist(PathBuf, #[source] tempfile::PersistError),

    #[error("Failed to encode CSV rows for '{0}'")]
    CsvEncode(PathBuf, #[source] csv::Error),

    #[error("Failed to decode CSV rows from '{0}'")]
    CsvDecode(PathBuf, #[source] csv::Error),

    #[error("Invalid row in '{path}': {message}")]
    InvalidRow { path: PathBuf, message: String },

    #[error("Failed to scan cache file '{0}'")]
    CsvScan(PathBuf, #[source] PolarsError),

    #[error("Failed to combine cache partitions")]
    FrameConcat(#[source] PolarsError),

    #[error("Background cache task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
