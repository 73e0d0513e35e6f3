//! NNUE position evaluation for chess.
//!
//! - [`board`]: minimal position type (FEN, make/unmake, dirty pieces)
//! - [`nnue`]: networks, accumulators, refresh cache, loading
//! - [`evaluate`]: the blender turning network outputs into one score
//! - [`config`]: option surface and tuned constants

pub mod board;
pub mod config;
pub mod driver;
pub mod evaluate;
pub mod nnue;

pub use board::{Board, Color, DirtyPiece, Move, Piece, Square};
pub use config::{ClassifierConfig, EvalConfig, EvalOptions};
pub use evaluate::{evaluate, trace, Evaluator};
pub use nnue::{Networks, NnueError, NnueState};
