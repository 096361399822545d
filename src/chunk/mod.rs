//! Rotating family of append-only chunk files.
//!
//! A [`ChunkWriter`] owns the rotation state of one chunk root. Every append
//! runs the same critical section: refresh the state from disk, rotate if the
//! record would push the current chunk past its threshold, append, and
//! advance the offset. The section is guarded by an in-process mutex and an
//! exclusive `flock` on `<root>/.chunks.lock`, so writers on other threads and
//! in other processes that opened the same root never receive overlapping
//! placements.

mod lock;

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use self::lock::FamilyLock;
use crate::{
    error::{Error, IoResultExt, Result},
    logging::chunkdex_log,
};

/// File extension of chunk files.
pub const CHUNK_EXTENSION: &str = "chnk";
const CHUNK_PREFIX: &str = "chunk_";
const LOCK_FILE_NAME: &str = ".chunks.lock";

/// Rotation threshold used when none is configured (10 MiB).
pub const DEFAULT_CHUNK_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Location of one record's bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Placement {
    /// Chunk file name, relative to the chunk root.
    pub chunk_name: String,
    /// Byte offset of the record within the chunk.
    pub offset_bytes: u64,
    /// Byte length of the encoded record.
    pub size_bytes: u64,
}

impl Placement {
    /// First byte past the record.
    pub fn end(&self) -> u64 {
        self.offset_bytes + self.size_bytes
    }

    /// Whether two placements share bytes of the same chunk.
    pub fn overlaps(&self, other: &Placement) -> bool {
        self.chunk_name == other.chunk_name
            && self.offset_bytes < other.end()
            && other.offset_bytes < self.end()
    }
}

/// Durability policy applied to chunk appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Call `sync_data` after every append.
    Always,
    /// Sync a chunk when rotating away from it and on [`ChunkWriter::finish`].
    #[default]
    OnRotate,
    /// Never sync explicitly (testing only).
    Disabled,
}

/// Name of the chunk file with rotation index `index`.
pub fn chunk_file_name(index: u64) -> String {
    format!("{CHUNK_PREFIX}{index}.{CHUNK_EXTENSION}")
}

/// Rotation index encoded in a chunk file name.
pub fn chunk_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(CHUNK_PREFIX)?
        .strip_suffix(CHUNK_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

#[derive(Debug)]
struct ChunkState {
    current_index: u64,
    current_offset: u64,
    current_size: u64,
    /// Whether the current chunk file has been created.
    current_exists: bool,
    file: Option<File>,
}

/// Shared appender over one chunk family.
///
/// `ChunkWriter` is `Sync`; share it by reference (or `Arc`) between workers.
#[derive(Debug)]
pub struct ChunkWriter {
    root: PathBuf,
    max_chunk_size: u64,
    sync: SyncPolicy,
    lock: FamilyLock,
    state: Mutex<ChunkState>,
}

impl ChunkWriter {
    /// Open the chunk family under `root`, creating the directory if needed.
    ///
    /// Appends resume at the highest rotation index already present.
    pub fn open(root: impl Into<PathBuf>, max_chunk_size: u64, sync: SyncPolicy) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).at(&root)?;
        let lock = FamilyLock::open(&root.join(LOCK_FILE_NAME))?;
        let current_index = latest_chunk_index(&root)?.unwrap_or(0);

        Ok(Self {
            root,
            max_chunk_size,
            sync,
            lock,
            state: Mutex::new(ChunkState {
                current_index,
                current_offset: 0,
                current_size: 0,
                current_exists: false,
                file: None,
            }),
        })
    }

    /// Directory holding the chunk files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rotation threshold in bytes.
    pub fn max_chunk_size(&self) -> u64 {
        self.max_chunk_size
    }

    /// Append one encoded record and return where it landed.
    pub fn write(&self, encoded: &[u8]) -> Result<Placement> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| {
                Error::io(&self.root, std::io::Error::other("chunk state mutex poisoned"))
            })?;
        let _guard = self.lock.acquire()?;

        self.refresh(&mut state)?;

        let len = encoded.len() as u64;
        if state.current_exists && state.current_size + len > self.max_chunk_size {
            self.rotate(&mut state)?;
        }

        let chunk_name = chunk_file_name(state.current_index);
        let path = self.root.join(&chunk_name);
        if state.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .at(&path)?;
            state.file = Some(file);
            state.current_exists = true;
        }
        if let Some(file) = state.file.as_mut() {
            file.write_all(encoded).at(&path)?;
            if self.sync == SyncPolicy::Always {
                file.sync_data().at(&path)?;
            }
        }

        let placement = Placement {
            chunk_name,
            offset_bytes: state.current_offset,
            size_bytes: len,
        };
        state.current_offset += len;
        state.current_size += len;
        Ok(placement)
    }

    /// Sync the open chunk according to the policy.
    pub fn finish(&self) -> Result<()> {
        let state = self
            .state
            .lock()
            .map_err(|_| {
                Error::io(&self.root, std::io::Error::other("chunk state mutex poisoned"))
            })?;
        if self.sync == SyncPolicy::Disabled {
            return Ok(());
        }
        if let Some(file) = state.file.as_ref() {
            let path = self.root.join(chunk_file_name(state.current_index));
            file.sync_all().at(path)?;
        }
        Ok(())
    }

    /// Pick up rotations and appends made through other handles on the same root.
    fn refresh(&self, state: &mut ChunkState) -> Result<()> {
        let next_exists = |index: u64| self.root.join(chunk_file_name(index + 1)).exists();
        if next_exists(state.current_index) {
            self.close_current(state)?;
            while next_exists(state.current_index) {
                state.current_index += 1;
            }
        }

        let path = self.root.join(chunk_file_name(state.current_index));
        match fs::metadata(&path) {
            Ok(meta) => {
                state.current_exists = true;
                state.current_offset = meta.len();
                state.current_size = meta.len();
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                state.current_exists = false;
                state.current_offset = 0;
                state.current_size = 0;
                state.file = None;
            }
            Err(err) => return Err(Error::io(path, err)),
        }
        Ok(())
    }

    fn rotate(&self, state: &mut ChunkState) -> Result<()> {
        self.close_current(state)?;
        state.current_index += 1;
        state.current_offset = 0;
        state.current_size = 0;
        state.current_exists = false;
        chunkdex_log!(
            log::Level::Debug,
            "chunk_rotate",
            "root={} next={}",
            self.root.display(),
            chunk_file_name(state.current_index)
        );
        Ok(())
    }

    fn close_current(&self, state: &mut ChunkState) -> Result<()> {
        if let Some(file) = state.file.take() {
            if self.sync == SyncPolicy::OnRotate {
                let path = self.root.join(chunk_file_name(state.current_index));
                file.sync_all().at(path)?;
            }
        }
        Ok(())
    }
}

fn latest_chunk_index(root: &Path) -> Result<Option<u64>> {
    let mut latest = None;
    for entry in fs::read_dir(root).at(root)? {
        let entry = entry.at(root)?;
        let name = entry.file_name();
        if let Some(index) = name.to_str().and_then(chunk_index) {
            latest = latest.max(Some(index));
        }
    }
    Ok(latest)
}
