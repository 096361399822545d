#![deny(missing_docs)]
//! Chunked binary storage for large collections of n-dimensional numeric
//! records.
//!
//! Records are appended by parallel workers into a family of size-bounded
//! chunk files, and a tabular index maps each record to its chunk, byte
//! offset, byte length, shape and user metadata. The index is persisted as
//! CSV; a [`RecordReader`] serves random access by row either from per-call
//! file reads or from read-only memory mappings of every referenced chunk.
//!
//! ```no_run
//! use chunkdex::{IngestOptions, Ingestor, ReadOptions, Record, RecordReader};
//!
//! # fn main() -> chunkdex::Result<()> {
//! let records = (0..3).map(|i| {
//!     Record::from_elements(&[i as f32; 4], [2, 2])
//!         .expect("shape matches")
//!         .with_metadata("label", "cat")
//! });
//! let outcome = Ingestor::new(IngestOptions::default().worker_count(2))
//!     .ingest("dataset", records)?;
//!
//! let reader = RecordReader::open(
//!     &outcome.index_path,
//!     ReadOptions::default().chunk_root(&outcome.chunk_root),
//! )?;
//! let first = reader.read(0)?;
//! assert_eq!(first.view::<f32>()?.len(), 4);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
mod error;
pub mod index;
mod ingest;
mod logging;
mod option;
pub mod read;
pub mod record;

pub use crate::{
    chunk::{ChunkWriter, Placement, SyncPolicy},
    error::{Error, Result},
    index::{Index, IndexRow},
    ingest::{IngestOutcome, Ingestor},
    option::{IngestOptions, ReadOptions, WorkerCount, DEFAULT_CHUNK_DIR, INDEX_FILE_NAME},
    read::{build_reader, RecordRead, RecordReader, TensorView},
    record::{DType, Element, Metadata, MetadataValue, Record, Shape},
};
