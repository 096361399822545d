//! In-memory representation of one data record.
//!
//! A [`Record`] couples an encoded element buffer with its declared [`Shape`],
//! element [`DType`] and a free-form [`Metadata`] mapping. Construction checks
//! that the buffer length matches `product(shape) * dtype.size()`.

mod dtype;
mod shape;
mod value;

pub use dtype::{DType, Element};
pub use shape::Shape;
pub(crate) use value::ValueKind;
pub use value::{Metadata, MetadataValue};

use crate::error::{Error, Result};

/// One record as produced by a producer, owned until it is written.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    buffer: Vec<u8>,
    shape: Shape,
    dtype: DType,
    metadata: Metadata,
}

impl Record {
    /// Wrap an already encoded little-endian buffer.
    ///
    /// Fails with [`Error::ShapeMismatch`] when the buffer length disagrees with
    /// the shape and element type.
    pub fn new(buffer: Vec<u8>, shape: impl Into<Shape>, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        check_byte_len(&shape, dtype, buffer.len())?;
        Ok(Self {
            buffer,
            shape,
            dtype,
            metadata: Metadata::new(),
        })
    }

    /// Encode typed elements into a record tagged with `T::DTYPE`.
    pub fn from_elements<T: Element>(values: &[T], shape: impl Into<Shape>) -> Result<Self> {
        let mut buffer = Vec::with_capacity(std::mem::size_of_val(values));
        for value in values {
            value.extend_le(&mut buffer);
        }
        Self::new(buffer, shape, T::DTYPE)
    }

    /// Attach one metadata field, replacing an earlier value under the same key.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the whole metadata mapping.
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Encoded buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Declared shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Declared element type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Metadata fields.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Split into buffer, shape, dtype and metadata.
    pub fn into_parts(self) -> (Vec<u8>, Shape, DType, Metadata) {
        (self.buffer, self.shape, self.dtype, self.metadata)
    }
}

pub(crate) fn check_byte_len(shape: &Shape, dtype: DType, actual: usize) -> Result<()> {
    let expected = shape.byte_len(dtype.size()).ok_or_else(|| {
        Error::IndexFormat(format!("shape {shape} overflows the addressable size"))
    })?;
    if expected != actual as u64 {
        return Err(Error::ShapeMismatch {
            expected,
            actual: actual as u64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_elements_little_endian() {
        let record = Record::from_elements(&[1.0f32, 2.0, 3.0, 4.0], [2, 2]).unwrap();
        assert_eq!(record.dtype(), DType::F32);
        assert_eq!(record.bytes().len(), 16);
        assert_eq!(&record.bytes()[..4], &1.0f32.to_le_bytes());
        assert_eq!(record.shape().dims(), &[2, 2]);
    }

    #[test]
    fn rejects_buffer_that_disagrees_with_shape() {
        let err = Record::new(vec![0u8; 15], [2, 2], DType::F32).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn metadata_builder_overwrites_keys() {
        let record = Record::new(vec![7u8], [1], DType::U8)
            .unwrap()
            .with_metadata("label", "cat")
            .with_metadata("label", "dog")
            .with_metadata("split", 3i64);
        assert_eq!(record.metadata().len(), 2);
        assert_eq!(record.metadata()["label"].as_str(), Some("dog"));
        assert_eq!(record.metadata()["split"].as_i64(), Some(3));
    }
}
