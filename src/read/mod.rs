//! Index-driven random access to ingested records.
//!
//! A [`RecordReader`] resolves an index row to its chunk file and byte range,
//! optionally gzip-decompresses the bytes, and checks them against the row's
//! shape and the configured element type. In per-call mode every read opens,
//! seeks and reads the chunk file; in in-memory mode every chunk the index
//! references is mapped read-only when the reader is built and reads slice
//! those mappings. Mappings are released when the reader is dropped.

mod codec;
mod mapped;
mod view;

use std::{
    borrow::Cow,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

pub use self::view::TensorView;
use self::mapped::MappedChunks;
use crate::{
    error::{Error, IoResultExt, Result},
    index::Index,
    logging::chunkdex_log,
    option::ReadOptions,
    record::{check_byte_len, DType, Element, Metadata, Shape},
};

/// Random-access reader over an [`Index`] and its chunk files.
#[derive(Debug)]
pub struct RecordReader {
    index: Index,
    options: ReadOptions,
    mapped: Option<MappedChunks>,
}

/// Build a reader from individual settings.
pub fn build_reader(
    index: Index,
    dtype: DType,
    use_compression: bool,
    chunk_root: impl Into<PathBuf>,
    in_memory: bool,
) -> Result<RecordReader> {
    RecordReader::new(
        index,
        ReadOptions::default()
            .dtype(dtype)
            .use_compression(use_compression)
            .chunk_root(chunk_root)
            .in_memory(in_memory),
    )
}

impl RecordReader {
    /// Build a reader; in in-memory mode this maps every referenced chunk.
    pub fn new(index: Index, options: ReadOptions) -> Result<Self> {
        let mapped = if options.in_memory {
            let mapped = MappedChunks::map_all(&options.chunk_root, index.chunk_names())?;
            chunkdex_log!(
                log::Level::Debug,
                "reader_mapped",
                "root={} chunks={} bytes={}",
                options.chunk_root.display(),
                mapped.len(),
                mapped.mapped_bytes()
            );
            Some(mapped)
        } else {
            None
        };
        Ok(Self {
            index,
            options,
            mapped,
        })
    }

    /// Load the CSV index at `index_path` and build a reader over it.
    pub fn open(index_path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        Self::new(Index::load(index_path)?, options)
    }

    /// Index the reader serves.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Number of readable rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index holds no rows.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether reads are served from memory mappings.
    pub fn is_in_memory(&self) -> bool {
        self.mapped.is_some()
    }

    /// Read the record at `row`.
    ///
    /// A failed read does not affect later reads.
    pub fn read(&self, row: usize) -> Result<RecordRead<'_>> {
        let entry = self.index.row(row).ok_or(Error::RowOutOfBounds {
            row,
            len: self.index.len(),
        })?;
        let placement = &entry.placement;
        let root = &self.options.chunk_root;

        let raw: Cow<'_, [u8]> = match &self.mapped {
            Some(mapped) => Cow::Borrowed(mapped.slice(
                root,
                &placement.chunk_name,
                placement.offset_bytes,
                placement.size_bytes,
            )?),
            None => Cow::Owned(read_range(
                &root.join(&placement.chunk_name),
                placement.offset_bytes,
                placement.size_bytes,
            )?),
        };
        let data = if self.options.use_compression {
            Cow::Owned(codec::decompress(&placement.chunk_name, &raw)?)
        } else {
            raw
        };

        check_byte_len(&entry.shape, self.options.dtype, data.len())?;

        Ok(RecordRead {
            data,
            shape: entry.shape.clone(),
            dtype: self.options.dtype,
            metadata: self.index.metadata(row).unwrap_or_default(),
        })
    }
}

/// Read `[offset, offset + size)` of the chunk at `path`.
///
/// The range is checked against the file length before the buffer is allocated.
fn read_range(path: &Path, offset: u64, size: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path).at(path)?;
    let file_len = file.metadata().at(path)?.len();
    let len = offset
        .checked_add(size)
        .filter(|&end| end <= file_len)
        .and_then(|_| usize::try_from(size).ok())
        .ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "range {offset}..{} lies past the end of the chunk ({file_len} bytes)",
                        offset.saturating_add(size)
                    ),
                ),
            )
        })?;
    file.seek(SeekFrom::Start(offset)).at(path)?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).at(path)?;
    Ok(buf)
}

/// One record read back through a [`RecordReader`].
#[derive(Debug, Clone)]
pub struct RecordRead<'r> {
    data: Cow<'r, [u8]>,
    shape: Shape,
    dtype: DType,
    metadata: Metadata,
}

impl<'r> RecordRead<'r> {
    /// Decoded bytes of the record.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the bytes, copying out of a mapping if needed.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_owned()
    }

    /// Shape recorded in the index.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element type the reader decodes with.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Every non-reserved index column of the row.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Split into bytes, shape and metadata.
    pub fn into_parts(self) -> (Cow<'r, [u8]>, Shape, Metadata) {
        (self.data, self.shape, self.metadata)
    }

    /// Borrow the bytes as typed elements.
    pub fn view<T: Element>(&self) -> Result<TensorView<'_, T>> {
        if !T::accepts(self.dtype) {
            return Err(Error::DTypeMismatch {
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        TensorView::new(&self.data, &self.shape)
    }
}
