use std::marker::PhantomData;

use crate::{
    error::Result,
    record::{check_byte_len, Element, Shape},
};

/// Typed, zero-copy view over a record's bytes.
///
/// Elements are decoded from little-endian bytes on access, so the borrowed
/// buffer needs no particular alignment.
#[derive(Clone, Copy, Debug)]
pub struct TensorView<'a, T> {
    bytes: &'a [u8],
    shape: &'a Shape,
    _elem: PhantomData<T>,
}

impl<'a, T: Element> TensorView<'a, T> {
    /// Borrow `bytes` as elements of `T` laid out row-major in `shape`.
    ///
    /// Fails with [`ShapeMismatch`](crate::Error::ShapeMismatch) when the length disagrees.
    pub fn new(bytes: &'a [u8], shape: &'a Shape) -> Result<Self> {
        check_byte_len(shape, T::DTYPE, bytes.len())?;
        Ok(Self {
            bytes,
            shape,
            _elem: PhantomData,
        })
    }

    /// Extents of the view.
    pub fn shape(&self) -> &'a Shape {
        self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / T::DTYPE.size()
    }

    /// Whether the view holds no elements.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Underlying bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Element at flat (row-major) position `i`.
    pub fn get(&self, i: usize) -> Option<T> {
        let size = T::DTYPE.size();
        let start = i.checked_mul(size)?;
        self.bytes
            .get(start..start.checked_add(size)?)
            .map(T::from_le_slice)
    }

    /// Element at the multi-dimensional position `index`.
    pub fn at(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&pos, &dim) in index.iter().zip(self.shape.iter()) {
            if pos >= dim {
                return None;
            }
            flat = flat * dim + pos;
        }
        self.get(flat)
    }

    /// Iterate over elements in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        self.bytes
            .chunks_exact(T::DTYPE.size())
            .map(T::from_le_slice)
    }

    /// Copy the elements out.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn encode(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn indexes_row_major() {
        let bytes = encode(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let shape = Shape::from([2, 3]);
        let view = TensorView::<f32>::new(&bytes, &shape).unwrap();

        assert_eq!(view.len(), 6);
        assert_eq!(view.at(&[0, 0]), Some(1.0));
        assert_eq!(view.at(&[1, 2]), Some(6.0));
        assert_eq!(view.at(&[2, 0]), None);
        assert_eq!(view.at(&[1]), None);
        assert_eq!(view.get(6), None);
        assert_eq!(view.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_length_mismatch() {
        let bytes = encode(&[1.0, 2.0, 3.0]);
        let shape = Shape::from([2, 2]);
        assert!(matches!(
            TensorView::<f32>::new(&bytes, &shape),
            Err(Error::ShapeMismatch {
                expected: 16,
                actual: 12
            })
        ));
    }

    #[test]
    fn unaligned_bytes_decode() {
        let mut bytes = vec![0u8];
        bytes.extend(encode(&[7.5, -1.0]));
        let shape = Shape::from([2]);
        let view = TensorView::<f32>::new(&bytes[1..], &shape).unwrap();
        assert_eq!(view.to_vec(), vec![7.5, -1.0]);
    }

    #[test]
    fn scalar_shape_holds_one_element() {
        let bytes = 42u64.to_le_bytes();
        let shape = Shape::default();
        let view = TensorView::<u64>::new(&bytes, &shape).unwrap();
        assert_eq!(view.at(&[]), Some(42));
    }
}
