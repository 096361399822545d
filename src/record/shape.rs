use std::{fmt, ops::Deref, str::FromStr};

use crate::error::Error;

/// Ordered extents of a record buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Build a shape from its extents.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// Extents in order.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of elements the shape addresses; a scalar (empty) shape holds one.
    ///
    /// Returns `None` when the product overflows `usize`.
    pub fn num_elements(&self) -> Option<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
    }

    /// Bytes needed to store the shape with elements of `elem_size` bytes.
    pub fn byte_len(&self, elem_size: usize) -> Option<u64> {
        self.num_elements()
            .and_then(|n| n.checked_mul(elem_size))
            .map(|n| n as u64)
    }
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

/// Renders as a tuple literal: `(3, 4)`, `(5,)`, `()`.
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

/// Parses tuple (`(3, 4)`, `(5,)`) or list (`[3, 4]`) literals of non-negative integers.
impl FromStr for Shape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .or_else(|| {
                trimmed
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
            })
            .ok_or_else(|| Error::IndexFormat(format!("shape literal {s:?} is not a sequence")))?;

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let last = parts.len() - 1;
        let mut dims = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            if part.is_empty() {
                // a trailing comma or an empty shape leaves one empty slot at the end
                if i == last {
                    continue;
                }
                return Err(Error::IndexFormat(format!("shape literal {s:?} has an empty extent")));
            }
            let dim = part.parse::<usize>().map_err(|err| {
                Error::IndexFormat(format!("shape literal {s:?} has bad extent {part:?}: {err}"))
            })?;
            dims.push(dim);
        }
        Ok(Self(dims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_python_tuples() {
        assert_eq!(Shape::from([3, 4]).to_string(), "(3, 4)");
        assert_eq!(Shape::from([5]).to_string(), "(5,)");
        assert_eq!(Shape::default().to_string(), "()");
    }

    #[test]
    fn parses_tuples_and_lists() {
        assert_eq!("(3, 4)".parse::<Shape>().unwrap().dims(), &[3, 4]);
        assert_eq!("(5,)".parse::<Shape>().unwrap().dims(), &[5]);
        assert_eq!("()".parse::<Shape>().unwrap().dims(), &[] as &[usize]);
        assert_eq!(" [2,2,1] ".parse::<Shape>().unwrap().dims(), &[2, 2, 1]);
    }

    #[test]
    fn rejects_malformed_literals() {
        for bad in ["3, 4", "(3,,4)", "(,)", "(a, 4)", "(-1,)", "(3"] {
            assert!(
                matches!(bad.parse::<Shape>(), Err(Error::IndexFormat(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn element_count_of_scalar_is_one() {
        assert_eq!(Shape::default().num_elements(), Some(1));
        assert_eq!(Shape::from([2, 0, 3]).num_elements(), Some(0));
        assert_eq!(Shape::from([2, 2]).byte_len(4), Some(16));
        assert_eq!(Shape::from([usize::MAX, 2]).num_elements(), None);
    }
}
