//! Core chess types.
//!
//! - `Piece` and `Color` - chess piece types and colors
//! - `Square` - compact board square (a1 = 0 ... h8 = 63)
//! - `Bitboard` - 64-bit square sets
//! - `Move` - from, to and move kind
//! - `DirtyPiece` - per-move record of pieces removed and added

mod bitboard;
mod dirty;
mod moves;
mod piece;
mod square;

pub use bitboard::{Bitboard, BitboardIter};
pub use dirty::{DirtyPiece, PieceChange};
pub use moves::{Move, MoveKind};
pub use piece::{Color, Piece};
pub use square::Square;

pub(crate) const CASTLE_WHITE_K: u8 = 1 << 0;
pub(crate) const CASTLE_WHITE_Q: u8 = 1 << 1;
pub(crate) const CASTLE_BLACK_K: u8 = 1 << 2;
pub(crate) const CASTLE_BLACK_Q: u8 = 1 << 3;

/// Castling-right bit for a color and side (`'K'` kingside, `'Q'` queenside)
#[inline]
pub(crate) const fn castle_bit(color: Color, side: char) -> u8 {
    match (color, side) {
        (Color::White, 'K') => CASTLE_WHITE_K,
        (Color::White, _) => CASTLE_WHITE_Q,
        (Color::Black, 'K') => CASTLE_BLACK_K,
        (Color::Black, _) => CASTLE_BLACK_Q,
    }
}
