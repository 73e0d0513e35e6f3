//! Move type.
//!
//! A move is its two squares plus a [`MoveKind`] that `make_move` needs to
//! produce the right dirty-piece shape. Kinds are inferred from the position
//! when parsing UCI text.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::piece::Piece;
use super::square::Square;

/// What a move does besides relocating one piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MoveKind {
    Quiet,
    Capture,
    DoublePawnPush,
    EnPassant,
    /// King move of two files; the rook is moved alongside
    Castle,
    Promotion { piece: Piece, capture: bool },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Move {
    from: Square,
    to: Square,
    kind: MoveKind,
}

impl Move {
    #[inline]
    #[must_use]
    pub const fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Move { from, to, kind }
    }

    #[inline]
    #[must_use]
    pub const fn quiet(from: Square, to: Square) -> Self {
        Move::new(from, to, MoveKind::Quiet)
    }

    #[inline]
    #[must_use]
    pub const fn capture(from: Square, to: Square) -> Self {
        Move::new(from, to, MoveKind::Capture)
    }

    #[inline]
    #[must_use]
    pub const fn double_pawn_push(from: Square, to: Square) -> Self {
        Move::new(from, to, MoveKind::DoublePawnPush)
    }

    #[inline]
    #[must_use]
    pub const fn en_passant(from: Square, to: Square) -> Self {
        Move::new(from, to, MoveKind::EnPassant)
    }

    /// `to` is the king's destination
    #[inline]
    #[must_use]
    pub const fn castle(from: Square, to: Square) -> Self {
        Move::new(from, to, MoveKind::Castle)
    }

    #[inline]
    #[must_use]
    pub const fn promotion(from: Square, to: Square, piece: Piece, capture: bool) -> Self {
        Move::new(from, to, MoveKind::Promotion { piece, capture })
    }

    #[inline]
    #[must_use]
    pub const fn from(self) -> Square {
        self.from
    }

    #[inline]
    #[must_use]
    pub const fn to(self) -> Square {
        self.to
    }

    #[inline]
    #[must_use]
    pub const fn kind(self) -> MoveKind {
        self.kind
    }

    /// En passant counts as a capture
    #[inline]
    #[must_use]
    pub const fn is_capture(self) -> bool {
        matches!(
            self.kind,
            MoveKind::Capture | MoveKind::EnPassant | MoveKind::Promotion { capture: true, .. }
        )
    }

    #[inline]
    #[must_use]
    pub const fn is_en_passant(self) -> bool {
        matches!(self.kind, MoveKind::EnPassant)
    }

    #[inline]
    #[must_use]
    pub const fn is_castling(self) -> bool {
        matches!(self.kind, MoveKind::Castle)
    }

    #[inline]
    #[must_use]
    pub const fn is_double_pawn_push(self) -> bool {
        matches!(self.kind, MoveKind::DoublePawnPush)
    }

    #[inline]
    #[must_use]
    pub const fn promotion_piece(self) -> Option<Piece> {
        match self.kind {
            MoveKind::Promotion { piece, .. } => Some(piece),
            _ => None,
        }
    }
}

/// UCI long algebraic form
impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        match self.promotion_piece() {
            Some(piece) => write!(f, "{}", piece.to_char()),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({:?})", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_capturing_promotion() {
        let mv = Move::promotion(sq("b7"), sq("a8"), Piece::Rook, true);
        assert_eq!((mv.from(), mv.to()), (sq("b7"), sq("a8")));
        assert!(mv.is_capture());
        assert!(!mv.is_en_passant());
        assert_eq!(mv.promotion_piece(), Some(Piece::Rook));
        assert_eq!(mv.to_string(), "b7a8r");
    }

    #[test]
    fn test_kind_queries() {
        assert!(Move::castle(sq("e8"), sq("c8")).is_castling());
        assert!(!Move::quiet(sq("e1"), sq("f1")).is_castling());
        assert!(Move::en_passant(sq("e5"), sq("f6")).is_capture());
        assert!(!Move::double_pawn_push(sq("e2"), sq("e4")).is_capture());
        assert_eq!(
            Move::capture(sq("d4"), sq("e5")).kind(),
            MoveKind::Capture
        );
    }
}
