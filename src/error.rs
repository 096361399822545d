//! Error taxonomy shared by the write and read paths.

use std::{io, path::PathBuf};

use arrow_schema::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

use crate::record::DType;

/// Result type shared across chunkdex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by ingestion, index handling, and record reads.
#[derive(Debug, Error)]
pub enum Error {
    /// The ingestion output path already exists.
    #[error("ingestion target {0} already exists")]
    TargetAlreadyExists(PathBuf),
    /// The ingestion output path names a plain file and cannot host a directory.
    #[error("ingestion target {0} is a plain file")]
    InvalidTarget(PathBuf),
    /// Open, seek, read, write or append failure on a chunk or index file.
    #[error("io failure on {path}: {source}")]
    Io {
        /// File or directory the operation targeted.
        path: PathBuf,
        /// Underlying operating-system error.
        #[source]
        source: io::Error,
    },
    /// Metadata columns disagree between tables or records of one run.
    #[error("metadata schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Byte length does not match the declared shape and element type.
    #[error("shape mismatch: shape and dtype require {expected} bytes, buffer holds {actual}")]
    ShapeMismatch {
        /// Byte length implied by shape and dtype.
        expected: u64,
        /// Byte length actually present.
        actual: u64,
    },
    /// A requested feature is intentionally not implemented.
    #[error("unsupported option: {0}")]
    UnsupportedOption(&'static str),
    /// The element type of a record or view disagrees with the configured one.
    #[error("dtype mismatch: expected {expected}, found {actual}")]
    DTypeMismatch {
        /// Element type the caller configured.
        expected: DType,
        /// Element type carried by the record.
        actual: DType,
    },
    /// The index file is missing reserved columns or holds unparsable cells.
    #[error("malformed index: {0}")]
    IndexFormat(String),
    /// A lookup addressed a row past the end of the index.
    #[error("row {row} out of bounds for index of {len} rows")]
    RowOutOfBounds {
        /// Requested row.
        row: usize,
        /// Number of rows in the index.
        len: usize,
    },
    /// An ingestion worker panicked.
    #[error("ingestion worker {0} panicked")]
    WorkerPanicked(usize),
    /// The worker stopped because a sibling worker failed.
    #[error("ingestion aborted after a sibling worker failed")]
    Aborted,
    /// Arrow conversion or CSV codec failure.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
    /// Parquet codec failure on a worker-local table.
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Attach the offending path to `std::io` failures.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::io(path, source))
    }
}
