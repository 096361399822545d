use std::{fmt, str::FromStr};

use crate::error::Error;

/// Element type tag for record buffers.
///
/// Element bytes are always little-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DType {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 64-bit integer.
    I64,
    /// IEEE half precision float, viewed as raw `u16` bits.
    F16,
    /// IEEE single precision float.
    #[default]
    F32,
    /// IEEE double precision float.
    F64,
}

impl DType {
    /// Width of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 | DType::F16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    /// Canonical numpy-style name.
    pub const fn name(self) -> &'static str {
        match self {
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::U16 => "uint16",
            DType::I16 => "int16",
            DType::U32 => "uint32",
            DType::I32 => "int32",
            DType::U64 => "uint64",
            DType::I64 => "int64",
            DType::F16 => "float16",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s.trim().to_ascii_lowercase().as_str() {
            "uint8" | "u8" => DType::U8,
            "int8" | "i8" => DType::I8,
            "uint16" | "u16" => DType::U16,
            "int16" | "i16" => DType::I16,
            "uint32" | "u32" => DType::U32,
            "int32" | "i32" => DType::I32,
            "uint64" | "u64" => DType::U64,
            "int64" | "i64" => DType::I64,
            "float16" | "f16" | "half" => DType::F16,
            "float32" | "f32" | "float" => DType::F32,
            "float64" | "f64" | "double" => DType::F64,
            _ => return Err(Error::UnsupportedOption("unknown element dtype")),
        };
        Ok(dtype)
    }
}

/// Rust scalar that can be stored as a record element.
pub trait Element: Copy + Send + Sync + 'static {
    /// Tag written alongside buffers built from this type.
    const DTYPE: DType;

    /// Decode one element from exactly `DTYPE.size()` little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Append the little-endian encoding of `self`.
    fn extend_le(self, out: &mut Vec<u8>);

    /// Whether buffers tagged `dtype` may be viewed as `Self`.
    fn accepts(dtype: DType) -> bool {
        dtype == Self::DTYPE
    }
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                fn extend_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element!(
    u8 => U8,
    i8 => I8,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl Element for u16 {
    const DTYPE: DType = DType::U16;

    fn from_le_slice(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    // half floats have no native Rust type, so their bits are exposed as u16
    fn accepts(dtype: DType) -> bool {
        matches!(dtype, DType::U16 | DType::F16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numpy_names_and_aliases() {
        assert_eq!("float32".parse::<DType>().unwrap(), DType::F32);
        assert_eq!("F64".parse::<DType>().unwrap(), DType::F64);
        assert_eq!(" int16 ".parse::<DType>().unwrap(), DType::I16);
        assert!(matches!(
            "complex64".parse::<DType>(),
            Err(Error::UnsupportedOption(_))
        ));
    }

    #[test]
    fn sizes_follow_element_width() {
        assert_eq!(DType::U8.size(), 1);
        assert_eq!(DType::F16.size(), 2);
        assert_eq!(DType::F32.size(), std::mem::size_of::<f32>());
        assert_eq!(DType::I64.size(), 8);
    }

    #[test]
    fn half_floats_are_viewable_as_bits() {
        assert!(u16::accepts(DType::F16));
        assert!(!i16::accepts(DType::F16));
        assert!(!f32::accepts(DType::F64));
    }
}
