use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    thread,
};

use crate::{
    chunk::{SyncPolicy, DEFAULT_CHUNK_SIZE_BYTES},
    record::DType,
};

/// Directory under the output path that holds chunk files.
pub const DEFAULT_CHUNK_DIR: &str = "chunks";
/// File name of the merged index under the output path.
pub const INDEX_FILE_NAME: &str = "index.csv";
pub(crate) const WORKER_DIR: &str = ".workers";

/// Degree of parallelism for ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerCount {
    /// Exactly this many workers.
    Fixed(NonZeroUsize),
    /// One worker per available core.
    AllCores,
}

impl WorkerCount {
    /// Number of workers to spawn.
    pub fn resolve(self) -> usize {
        match self {
            WorkerCount::Fixed(n) => n.get(),
            WorkerCount::AllCores => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        WorkerCount::Fixed(NonZeroUsize::MIN)
    }
}

/// `0` selects [`WorkerCount::AllCores`].
impl From<usize> for WorkerCount {
    fn from(n: usize) -> Self {
        NonZeroUsize::new(n).map_or(WorkerCount::AllCores, WorkerCount::Fixed)
    }
}

/// Options for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub(crate) chunk_size_bytes: u64,
    pub(crate) worker_count: WorkerCount,
    pub(crate) element_dtype: DType,
    pub(crate) use_compression: bool,
    pub(crate) chunk_dir: PathBuf,
    pub(crate) metadata_columns: Option<Vec<String>>,
    pub(crate) sync_policy: SyncPolicy,
    pub(crate) verbose: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            worker_count: WorkerCount::default(),
            element_dtype: DType::F32,
            use_compression: false,
            chunk_dir: PathBuf::from(DEFAULT_CHUNK_DIR),
            metadata_columns: None,
            sync_policy: SyncPolicy::default(),
            verbose: false,
        }
    }
}

impl IngestOptions {
    /// Rotation threshold of a chunk file.
    pub fn chunk_size_bytes(self, chunk_size_bytes: u64) -> Self {
        IngestOptions {
            chunk_size_bytes,
            ..self
        }
    }

    /// Number of concurrent workers.
    pub fn worker_count(self, worker_count: impl Into<WorkerCount>) -> Self {
        IngestOptions {
            worker_count: worker_count.into(),
            ..self
        }
    }

    /// Element type every record must carry.
    pub fn element_dtype(self, element_dtype: DType) -> Self {
        IngestOptions {
            element_dtype,
            ..self
        }
    }

    /// Request per-record compression. Write-side compression is not
    /// implemented; ingestion fails fast when this is set.
    pub fn use_compression(self, use_compression: bool) -> Self {
        IngestOptions {
            use_compression,
            ..self
        }
    }

    /// Chunk directory relative to the output path.
    pub fn chunk_dir(self, chunk_dir: impl Into<PathBuf>) -> Self {
        IngestOptions {
            chunk_dir: chunk_dir.into(),
            ..self
        }
    }

    /// Declare the ordered metadata schema up front.
    ///
    /// Without a declared schema each worker's column set is the union of the
    /// keys it happened to see, so records with differing keys can merge with
    /// one worker and fail with [`SchemaMismatch`](crate::Error::SchemaMismatch)
    /// with several. Declaring the schema makes multi-worker runs deterministic.
    pub fn metadata_columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IngestOptions {
            metadata_columns: Some(columns.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    /// Durability policy for chunk appends.
    pub fn sync_policy(self, sync_policy: SyncPolicy) -> Self {
        IngestOptions {
            sync_policy,
            ..self
        }
    }

    /// Surface diagnostics such as cleanup failures at `warn` level.
    pub fn verbose(self, verbose: bool) -> Self {
        IngestOptions { verbose, ..self }
    }
}

impl IngestOptions {
    pub(crate) fn chunk_root(&self, output: &Path) -> PathBuf {
        output.join(&self.chunk_dir)
    }

    pub(crate) fn index_path(&self, output: &Path) -> PathBuf {
        output.join(INDEX_FILE_NAME)
    }

    pub(crate) fn worker_dir(&self, output: &Path) -> PathBuf {
        output.join(WORKER_DIR)
    }
}

/// Options for building a [`RecordReader`](crate::read::RecordReader).
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub(crate) dtype: DType,
    pub(crate) use_compression: bool,
    pub(crate) chunk_root: PathBuf,
    pub(crate) in_memory: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            dtype: DType::F32,
            use_compression: false,
            chunk_root: PathBuf::from(".").join(DEFAULT_CHUNK_DIR),
            in_memory: false,
        }
    }
}

impl ReadOptions {
    /// Element type used to decode records.
    pub fn dtype(self, dtype: DType) -> Self {
        ReadOptions { dtype, ..self }
    }

    /// Gzip-decompress each record after reading it.
    pub fn use_compression(self, use_compression: bool) -> Self {
        ReadOptions {
            use_compression,
            ..self
        }
    }

    /// Directory the index's chunk names are relative to.
    pub fn chunk_root(self, chunk_root: impl Into<PathBuf>) -> Self {
        ReadOptions {
            chunk_root: chunk_root.into(),
            ..self
        }
    }

    /// Map every referenced chunk file into memory up front.
    pub fn in_memory(self, in_memory: bool) -> Self {
        ReadOptions { in_memory, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_means_all_cores() {
        assert_eq!(WorkerCount::from(0), WorkerCount::AllCores);
        assert_eq!(WorkerCount::from(3).resolve(), 3);
        assert!(WorkerCount::AllCores.resolve() >= 1);
    }

    #[test]
    fn builders_override_defaults() {
        let options = IngestOptions::default()
            .chunk_size_bytes(32)
            .worker_count(4)
            .chunk_dir("blobs")
            .metadata_columns(["label"]);
        assert_eq!(options.chunk_size_bytes, 32);
        assert_eq!(options.worker_count.resolve(), 4);
        assert_eq!(options.chunk_root(Path::new("out")), Path::new("out/blobs"));
        assert_eq!(options.metadata_columns, Some(vec!["label".to_string()]));
        assert_eq!(IngestOptions::default().chunk_size_bytes, 10 * 1024 * 1024);
    }
}
