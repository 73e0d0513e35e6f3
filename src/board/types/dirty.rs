//! Dirty-piece records: the pieces a move took off and put on the board.

use super::piece::{Color, Piece};
use super::square::Square;

/// One (color, piece, square) entry of a dirty-piece record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PieceChange {
    pub color: Color,
    pub piece: Piece,
    pub square: Square,
}

impl PieceChange {
    #[inline]
    #[must_use]
    pub const fn new(color: Color, piece: Piece, square: Square) -> Self {
        PieceChange {
            color,
            piece,
            square,
        }
    }
}

/// Changes applied to the board by one move.
///
/// A promotion is a `Normal` (or `Capture`) change whose `to` entry holds the
/// promoted piece. En passant is a `Capture` whose `captured` square differs
/// from `to.square`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyPiece {
    Normal {
        from: PieceChange,
        to: PieceChange,
    },
    Capture {
        from: PieceChange,
        to: PieceChange,
        captured: PieceChange,
    },
    Castling {
        king_from: PieceChange,
        king_to: PieceChange,
        rook_from: PieceChange,
        rook_to: PieceChange,
    },
}

impl DirtyPiece {
    /// Entries removed from the board (one or two)
    pub fn removed(&self) -> impl Iterator<Item = PieceChange> {
        let (first, second) = match *self {
            DirtyPiece::Normal { from, .. } => (from, None),
            DirtyPiece::Capture { from, captured, .. } => (from, Some(captured)),
            DirtyPiece::Castling {
                king_from,
                rook_from,
                ..
            } => (king_from, Some(rook_from)),
        };
        std::iter::once(first).chain(second)
    }

    /// Entries added to the board (one or two)
    pub fn added(&self) -> impl Iterator<Item = PieceChange> {
        let (first, second) = match *self {
            DirtyPiece::Normal { to, .. } | DirtyPiece::Capture { to, .. } => (to, None),
            DirtyPiece::Castling {
                king_to, rook_to, ..
            } => (king_to, Some(rook_to)),
        };
        std::iter::once(first).chain(second)
    }

    /// True if this change lifted `color`'s king off its square.
    #[inline]
    #[must_use]
    pub fn moves_king(&self, color: Color) -> bool {
        self.removed()
            .any(|pc| pc.piece == Piece::King && pc.color == color)
    }
}
