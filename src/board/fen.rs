use std::str::FromStr;

use super::error::FenError;
use super::state::Board;
use super::types::{
    Color, Piece, Square, CASTLE_BLACK_K, CASTLE_BLACK_Q, CASTLE_WHITE_K, CASTLE_WHITE_Q,
};

impl Board {
    /// Parse a board position from FEN notation.
    ///
    /// Returns an error if the FEN string is invalid or either side does not
    /// have exactly one king.
    pub fn try_from_fen(fen: &str) -> Result<Self, FenError> {
        let mut board = Board::empty();
        let parts: Vec<&str> = fen.split_whitespace().collect();

        if parts.len() < 4 {
            return Err(FenError::TooFewParts { found: parts.len() });
        }

        // Piece placement
        for (rank_idx, rank_str) in parts[0].split('/').enumerate() {
            if rank_idx >= 8 {
                return Err(FenError::InvalidRank { rank: rank_idx });
            }
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                    continue;
                }
                let color = if c.is_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                let piece = Piece::from_char(c).ok_or(FenError::InvalidPiece { char: c })?;
                let sq = Square::new(7 - rank_idx as u8, file as u8).ok_or(
                    FenError::TooManyFiles {
                        rank: rank_idx,
                        files: file + 1,
                    },
                )?;
                board.set_piece(sq, color, piece);
                file += 1;
            }
            if file > 8 {
                return Err(FenError::TooManyFiles {
                    rank: rank_idx,
                    files: file,
                });
            }
        }

        for color in Color::BOTH {
            let found = board.count(color, Piece::King);
            if found != 1 {
                let color = if color == Color::White { "white" } else { "black" };
                return Err(FenError::KingCount { color, found });
            }
        }

        match parts[1] {
            "w" => board.white_to_move = true,
            "b" => board.white_to_move = false,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        }

        for c in parts[2].chars() {
            match c {
                'K' => board.castling_rights |= CASTLE_WHITE_K,
                'Q' => board.castling_rights |= CASTLE_WHITE_Q,
                'k' => board.castling_rights |= CASTLE_BLACK_K,
                'q' => board.castling_rights |= CASTLE_BLACK_Q,
                '-' => {}
                _ => return Err(FenError::InvalidCastling { char: c }),
            }
        }

        board.en_passant_target = match parts[3] {
            "-" => None,
            ep => Some(ep.parse().map_err(|_| FenError::InvalidEnPassant {
                found: ep.to_string(),
            })?),
        };

        // Move counters are optional
        if let Some(clock) = parts.get(4) {
            board.halfmove_clock = clock.parse().unwrap_or(0);
        }
        if let Some(fullmove) = parts.get(5) {
            board.fullmove_number = fullmove.parse().unwrap_or(1);
        }

        board.hash = board.calculate_hash();
        Ok(board)
    }

    /// Parse a board position from FEN notation.
    ///
    /// # Panics
    /// Panics if the FEN string is invalid. Use `try_from_fen` for fallible parsing.
    #[must_use]
    pub fn from_fen(fen: &str) -> Self {
        Self::try_from_fen(fen).expect("Invalid FEN string")
    }

    /// Convert the board position to FEN notation.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut rows: Vec<String> = Vec::with_capacity(8);
        for rank in (0..8u8).rev() {
            let mut row = String::new();
            let mut empty = 0;
            for file in 0..8u8 {
                let piece = Square::new(rank, file).and_then(|sq| self.piece_at(sq));
                if let Some((color, piece)) = piece {
                    if empty > 0 {
                        row.push_str(&empty.to_string());
                        empty = 0;
                    }
                    row.push(piece.to_fen_char(color));
                } else {
                    empty += 1;
                }
            }
            if empty > 0 {
                row.push_str(&empty.to_string());
            }
            rows.push(row);
        }

        let active = if self.white_to_move { "w" } else { "b" };
        let mut castling = String::new();
        for (bit, c) in [
            (CASTLE_WHITE_K, 'K'),
            (CASTLE_WHITE_Q, 'Q'),
            (CASTLE_BLACK_K, 'k'),
            (CASTLE_BLACK_Q, 'q'),
        ] {
            if self.castling_rights & bit != 0 {
                castling.push(c);
            }
        }
        if castling.is_empty() {
            castling.push('-');
        }
        let ep = self
            .en_passant_target
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {} {} {} {} {}",
            rows.join("/"),
            active,
            castling,
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

impl FromStr for Board {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Board::try_from_fen(s)
    }
}
