//! Error types for board operations.

use thiserror::Error;

/// Error type for FEN parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("FEN must have at least 4 parts, found {found}")]
    TooFewParts { found: usize },
    #[error("Invalid piece character '{char}' in FEN")]
    InvalidPiece { char: char },
    #[error("Invalid castling character '{char}' in FEN")]
    InvalidCastling { char: char },
    #[error("Invalid side to move '{found}', expected 'w' or 'b'")]
    InvalidSideToMove { found: String },
    #[error("Invalid en passant square '{found}'")]
    InvalidEnPassant { found: String },
    #[error("Invalid rank index {rank} in FEN")]
    InvalidRank { rank: usize },
    #[error("Too many files ({files}) in rank {rank}")]
    TooManyFiles { rank: usize, files: usize },
    #[error("Expected exactly one {color} king, found {found}")]
    KingCount { color: &'static str, found: u32 },
}

/// Error type for move parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveParseError {
    #[error("Move must be 4-5 characters, found {len}")]
    InvalidLength { len: usize },
    #[error("Invalid square notation in '{notation}'")]
    InvalidSquare { notation: String },
    #[error("Invalid promotion piece '{char}'")]
    InvalidPromotion { char: char },
    #[error("No piece of the side to move on the origin square of '{notation}'")]
    EmptyOrigin { notation: String },
    #[error("Move '{notation}' is not legal in this position")]
    Illegal { notation: String },
}

/// Error type for square parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquareError {
    #[error("Rank {rank} out of bounds (must be 0-7)")]
    RankOutOfBounds { rank: u8 },
    #[error("File {file} out of bounds (must be 0-7)")]
    FileOutOfBounds { file: u8 },
    #[error("Invalid square notation '{notation}'")]
    InvalidNotation { notation: String },
}
