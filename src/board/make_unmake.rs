use super::error::MoveParseError;
use super::state::{Board, UnmakeInfo};
use super::types::{castle_bit, Color, DirtyPiece, Move, Piece, PieceChange, Square};
use super::zobrist::ZOBRIST;

/// Rook origin and destination for a castling king move
fn castling_rook_squares(king_to: Square) -> (Square, Square) {
    let rank = king_to.rank() * 8;
    let (from_file, to_file) = if king_to.file() == 6 { (7, 5) } else { (0, 3) };
    (
        Square::from_index((rank + from_file) as usize),
        Square::from_index((rank + to_file) as usize),
    )
}

/// Square of the pawn captured en passant by `color` landing on `to`
fn en_passant_victim(color: Color, to: Square) -> Square {
    match color {
        Color::White => Square::from_index(to.index() - 8),
        Color::Black => Square::from_index(to.index() + 8),
    }
}

impl Board {
    #[inline]
    fn piece_key(color: Color, piece: Piece, sq: Square) -> u64 {
        ZOBRIST.piece_keys[piece.index()][color.index()][sq.index()]
    }

    fn has_castling_right(&self, color: Color, side: char) -> bool {
        self.castling_rights & castle_bit(color, side) != 0
    }

    /// Castling rights lost when a piece leaves or is captured on `sq`
    fn clear_rook_rights(&mut self, color: Color, sq: Square) {
        if sq.rank() != color.back_rank() {
            return;
        }
        match sq.file() {
            0 if self.has_castling_right(color, 'Q') => {
                self.castling_rights &= !castle_bit(color, 'Q');
            }
            7 if self.has_castling_right(color, 'K') => {
                self.castling_rights &= !castle_bit(color, 'K');
            }
            _ => {}
        }
    }

    /// Play a move and return what is needed to take it back, including the
    /// dirty-piece record for the accumulators.
    ///
    /// # Panics
    /// Panics if the origin square is empty. Moves built by `parse_move` are
    /// always accepted.
    pub fn make_move(&mut self, m: Move) -> UnmakeInfo {
        let previous_hash = self.hash;
        let previous_en_passant_target = self.en_passant_target;
        let previous_castling_rights = self.castling_rights;
        let previous_halfmove_clock = self.halfmove_clock;
        let previous_fullmove_number = self.fullmove_number;

        let us = self.side_to_move();
        let mut hash = self.hash ^ ZOBRIST.black_to_move_key;
        if let Some(old_ep) = self.en_passant_target {
            hash ^= ZOBRIST.en_passant_keys[old_ep.file() as usize];
        }
        hash ^= ZOBRIST.castling_keys[self.castling_rights as usize];

        let (from, to) = (m.from(), m.to());
        let (_, moving) = self.piece_at(from).expect("make_move 'from' empty");
        let from_change = PieceChange::new(us, moving, from);

        let mut captured_piece_info = None;
        let dirty = if m.is_castling() {
            let (rook_from, rook_to) = castling_rook_squares(to);
            self.remove_piece(from, us, Piece::King);
            self.remove_piece(rook_from, us, Piece::Rook);
            self.set_piece(to, us, Piece::King);
            self.set_piece(rook_to, us, Piece::Rook);
            hash ^= Self::piece_key(us, Piece::King, from)
                ^ Self::piece_key(us, Piece::King, to)
                ^ Self::piece_key(us, Piece::Rook, rook_from)
                ^ Self::piece_key(us, Piece::Rook, rook_to);
            DirtyPiece::Castling {
                king_from: from_change,
                king_to: PieceChange::new(us, Piece::King, to),
                rook_from: PieceChange::new(us, Piece::Rook, rook_from),
                rook_to: PieceChange::new(us, Piece::Rook, rook_to),
            }
        } else {
            let captured_sq = if m.is_en_passant() {
                en_passant_victim(us, to)
            } else {
                to
            };
            captured_piece_info = self.piece_at(captured_sq);
            let captured = captured_piece_info.map(|(color, piece)| {
                self.remove_piece(captured_sq, color, piece);
                hash ^= Self::piece_key(color, piece, captured_sq);
                PieceChange::new(color, piece, captured_sq)
            });

            let placed = m.promotion_piece().unwrap_or(moving);
            self.remove_piece(from, us, moving);
            self.set_piece(to, us, placed);
            hash ^= Self::piece_key(us, moving, from) ^ Self::piece_key(us, placed, to);

            let to_change = PieceChange::new(us, placed, to);
            match captured {
                Some(captured) => DirtyPiece::Capture {
                    from: from_change,
                    to: to_change,
                    captured,
                },
                None => DirtyPiece::Normal {
                    from: from_change,
                    to: to_change,
                },
            }
        };

        self.en_passant_target = None;
        if moving == Piece::Pawn && from.rank().abs_diff(to.rank()) == 2 {
            let ep_sq = Square::from_index((from.index() + to.index()) / 2);
            self.en_passant_target = Some(ep_sq);
            hash ^= ZOBRIST.en_passant_keys[ep_sq.file() as usize];
        }

        if moving == Piece::Pawn || captured_piece_info.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if us == Color::Black {
            self.fullmove_number += 1;
        }

        match moving {
            Piece::King => {
                self.castling_rights &= !(castle_bit(us, 'K') | castle_bit(us, 'Q'));
            }
            Piece::Rook => self.clear_rook_rights(us, from),
            _ => {}
        }
        if let Some((color, Piece::Rook)) = captured_piece_info {
            self.clear_rook_rights(color, to);
        }
        hash ^= ZOBRIST.castling_keys[self.castling_rights as usize];

        self.white_to_move = !self.white_to_move;
        self.hash = hash;

        UnmakeInfo {
            previous_en_passant_target,
            previous_castling_rights,
            previous_hash,
            previous_halfmove_clock,
            previous_fullmove_number,
            dirty,
        }
    }

    /// Take back a move played with `make_move`.
    pub fn unmake_move(&mut self, info: &UnmakeInfo) {
        for change in info.dirty.added() {
            self.remove_piece(change.square, change.color, change.piece);
        }
        for change in info.dirty.removed() {
            self.set_piece(change.square, change.color, change.piece);
        }

        self.white_to_move = !self.white_to_move;
        self.en_passant_target = info.previous_en_passant_target;
        self.castling_rights = info.previous_castling_rights;
        self.hash = info.previous_hash;
        self.halfmove_clock = info.previous_halfmove_clock;
        self.fullmove_number = info.previous_fullmove_number;
    }

    /// Parse a move in UCI long algebraic notation (e.g. "e2e4", "e7e8q").
    ///
    /// Flags (capture, en passant, castling, double push) are inferred from
    /// the position. Legality is not checked.
    ///
    /// # Example
    /// ```
    /// use nnue_eval::board::Board;
    ///
    /// let board = Board::new();
    /// let mv = board.parse_move("e2e4").unwrap();
    /// assert!(mv.is_double_pawn_push());
    /// ```
    pub fn parse_move(&self, uci: &str) -> Result<Move, MoveParseError> {
        if !(4..=5).contains(&uci.len()) || !uci.is_ascii() {
            return Err(MoveParseError::InvalidLength { len: uci.len() });
        }
        let invalid_square = || MoveParseError::InvalidSquare {
            notation: uci.to_string(),
        };
        let from: Square = uci[0..2].parse().map_err(|_| invalid_square())?;
        let to: Square = uci[2..4].parse().map_err(|_| invalid_square())?;

        let us = self.side_to_move();
        let moving = match self.piece_at(from) {
            Some((color, piece)) if color == us => piece,
            _ => {
                return Err(MoveParseError::EmptyOrigin {
                    notation: uci.to_string(),
                })
            }
        };
        let is_capture = self
            .piece_at(to)
            .is_some_and(|(color, _)| color != us);

        if let Some(c) = uci.chars().nth(4) {
            let piece = match Piece::from_char(c) {
                Some(p @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen)) => p,
                _ => return Err(MoveParseError::InvalidPromotion { char: c }),
            };
            return Ok(Move::promotion(from, to, piece, is_capture));
        }

        let mv = match moving {
            Piece::King if from.file().abs_diff(to.file()) == 2 => Move::castle(from, to),
            Piece::Pawn if Some(to) == self.en_passant_target && from.file() != to.file() => {
                Move::en_passant(from, to)
            }
            Piece::Pawn if from.rank().abs_diff(to.rank()) == 2 => {
                Move::double_pawn_push(from, to)
            }
            _ if is_capture => Move::capture(from, to),
            _ => Move::quiet(from, to),
        };
        Ok(mv)
    }

    /// Parse a move in UCI notation and check it against the legal moves.
    ///
    /// Returns the generated move, so its flags always agree with movegen.
    pub fn parse_legal_move(&self, uci: &str) -> Result<Move, MoveParseError> {
        let parsed = self.parse_move(uci)?;
        self.legal_moves()
            .into_iter()
            .find(|m| {
                m.from() == parsed.from()
                    && m.to() == parsed.to()
                    && m.promotion_piece() == parsed.promotion_piece()
            })
            .ok_or_else(|| MoveParseError::Illegal {
                notation: uci.to_string(),
            })
    }
}
