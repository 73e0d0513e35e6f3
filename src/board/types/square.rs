//! Square type and utilities.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::board::error::SquareError;

/// A square on the chess board, indexed a1 = 0, b1 = 1, ..., h8 = 63.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Square(u8);

impl Square {
    /// Create a square from rank and file with bounds checking
    #[must_use]
    pub const fn new(rank: u8, file: u8) -> Option<Self> {
        if rank < 8 && file < 8 {
            Some(Square(rank * 8 + file))
        } else {
            None
        }
    }

    /// Create a square from an index (0-63)
    ///
    /// # Panics
    /// Panics if `idx >= 64`.
    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Self {
        assert!(idx < 64, "square index out of range");
        Square(idx as u8)
    }

    /// Get the rank (0-7, where 0 = rank 1)
    #[inline]
    #[must_use]
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Get the file (0-7, where 0 = file a)
    #[inline]
    #[must_use]
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// Get the square's index (0-63)
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Flip the square vertically (e.g., a1 <-> a8)
    #[inline]
    #[must_use]
    pub const fn flip_vertical(self) -> Self {
        Square(self.0 ^ 56)
    }

    /// Flip the square horizontally (e.g., a1 <-> h1)
    #[inline]
    #[must_use]
    pub const fn flip_horizontal(self) -> Self {
        Square(self.0 ^ 7)
    }

    /// Single-bit bitboard mask for this square
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (self.file() + b'a') as char, self.rank() + 1)
    }
}

impl TryFrom<(u8, u8)> for Square {
    type Error = SquareError;

    fn try_from((rank, file): (u8, u8)) -> Result<Self, Self::Error> {
        if rank >= 8 {
            return Err(SquareError::RankOutOfBounds { rank });
        }
        if file >= 8 {
            return Err(SquareError::FileOutOfBounds { file });
        }
        Ok(Square(rank * 8 + file))
    }
}

impl FromStr for Square {
    type Err = SquareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2
            || !(b'a'..=b'h').contains(&bytes[0])
            || !(b'1'..=b'8').contains(&bytes[1])
        {
            return Err(SquareError::InvalidNotation {
                notation: s.to_string(),
            });
        }
        Ok(Square((bytes[1] - b'1') * 8 + (bytes[0] - b'a')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_parse_and_display() {
        let sq: Square = "e4".parse().unwrap();
        assert_eq!(sq.index(), 28);
        assert_eq!(sq.to_string(), "e4");
        assert!("i9".parse::<Square>().is_err());
        assert!("e".parse::<Square>().is_err());
    }

    #[test]
    fn test_square_flips() {
        let a1 = Square::from_index(0);
        assert_eq!(a1.flip_vertical().to_string(), "a8");
        assert_eq!(a1.flip_horizontal().to_string(), "h1");
        let e2: Square = "e2".parse().unwrap();
        assert_eq!(e2.flip_horizontal().to_string(), "d2");
    }

    #[test]
    fn test_try_from_bounds() {
        assert!(Square::try_from((8, 0)).is_err());
        assert!(Square::try_from((0, 8)).is_err());
        assert_eq!(Square::try_from((7, 7)).unwrap().index(), 63);
    }
}
