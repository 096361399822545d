//! Read-only memory mappings of whole chunk files.

use std::{collections::HashMap, fs::File, io, path::Path};

use memmap2::Mmap;

use crate::error::{Error, IoResultExt, Result};

/// Every chunk an index references, mapped once.
///
/// Empty chunk files are recorded without a mapping.
#[derive(Debug, Default)]
pub(crate) struct MappedChunks {
    maps: HashMap<String, Option<Mmap>>,
}

impl MappedChunks {
    pub(crate) fn map_all<'a>(
        root: &Path,
        chunk_names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut maps = HashMap::new();
        for name in chunk_names {
            let path = root.join(name);
            let file = File::open(&path).at(&path)?;
            let len = file.metadata().at(&path)?.len();
            let map = if len == 0 {
                None
            } else {
                // SAFETY: chunk files are append-only once ingestion finished and
                // the mapping is only ever read.
                Some(unsafe { Mmap::map(&file) }.at(&path)?)
            };
            maps.insert(name.to_string(), map);
        }
        Ok(Self { maps })
    }

    pub(crate) fn len(&self) -> usize {
        self.maps.len()
    }

    pub(crate) fn mapped_bytes(&self) -> u64 {
        self.maps
            .values()
            .flatten()
            .map(|map| map.len() as u64)
            .sum()
    }

    /// Bytes `[offset, offset + size)` of chunk `name`.
    pub(crate) fn slice(&self, root: &Path, name: &str, offset: u64, size: u64) -> Result<&[u8]> {
        let out_of_range = || {
            Error::io(
                root.join(name),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "range {offset}..{} lies past the end of the chunk",
                        offset.saturating_add(size)
                    ),
                ),
            )
        };
        let map = self.maps.get(name).ok_or_else(|| {
            Error::io(
                root.join(name),
                io::Error::new(io::ErrorKind::NotFound, "chunk was not mapped"),
            )
        })?;
        let bytes: &[u8] = map.as_deref().unwrap_or(&[]);
        let start = usize::try_from(offset).map_err(|_| out_of_range())?;
        let end = usize::try_from(size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .ok_or_else(out_of_range)?;
        bytes.get(start..end).ok_or_else(out_of_range)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn slices_stay_within_mapping() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("chunk_0.chnk"), b"abcdefgh").unwrap();
        fs::write(dir.path().join("chunk_1.chnk"), b"").unwrap();

        let maps = MappedChunks::map_all(dir.path(), ["chunk_0.chnk", "chunk_1.chnk"]).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps.mapped_bytes(), 8);
        assert_eq!(maps.slice(dir.path(), "chunk_0.chnk", 2, 3).unwrap(), b"cde");
        assert_eq!(maps.slice(dir.path(), "chunk_1.chnk", 0, 0).unwrap(), b"");

        let err = maps.slice(dir.path(), "chunk_0.chnk", 6, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::Io { ref source, .. } if source.kind() == io::ErrorKind::UnexpectedEof
        ));
        assert!(maps.slice(dir.path(), "chunk_9.chnk", 0, 1).is_err());
    }

    #[test]
    fn missing_chunk_fails_up_front() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            MappedChunks::map_all(dir.path(), ["chunk_0.chnk"]),
            Err(Error::Io { .. })
        ));
    }
}
