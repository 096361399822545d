use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

/// Inflate one gzip-compressed record.
pub(crate) fn decompress(chunk_name: &str, compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut out = Vec::with_capacity(compressed.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(|err| Error::io(chunk_name, err))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    #[test]
    fn inflates_gzip_members() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[3u8; 64]).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decompress("chunk_0.chnk", &compressed).unwrap(), vec![3u8; 64]);
    }

    #[test]
    fn corrupt_input_is_io_failure() {
        assert!(matches!(
            decompress("chunk_0.chnk", b"not gzip"),
            Err(Error::Io { .. })
        ));
    }
}
