//! Minimal chess position used by the evaluator.
//!
//! Bitboard placement, FEN parsing, make/unmake with dirty-piece records,
//! material counts and check detection.
//!
//! # Example
//! ```
//! use nnue_eval::board::{Board, Color};
//!
//! let mut board = Board::new();
//! let mv = board.parse_move("e2e4").unwrap();
//! let info = board.make_move(mv);
//! assert_eq!(board.side_to_move(), Color::Black);
//! board.unmake_move(&info);
//! assert_eq!(board.to_fen(), nnue_eval::board::START_FEN);
//! ```

mod attack_tables;
mod error;
mod fen;
mod make_unmake;
mod material;
mod movegen;
mod state;
mod types;
mod zobrist;

#[cfg(test)]
mod tests;

pub use attack_tables::piece_attacks;
pub use error::{FenError, MoveParseError, SquareError};
pub use state::{Board, UnmakeInfo, START_FEN};
pub use types::{Bitboard, BitboardIter, Color, DirtyPiece, Move, MoveKind, Piece, PieceChange, Square};
