use super::attack_tables::{
    bishop_attacks, rook_attacks, KING_ATTACKS, KNIGHT_ATTACKS, PAWN_ATTACKS,
};
use super::types::{
    Bitboard, Color, DirtyPiece, Piece, Square, CASTLE_BLACK_K, CASTLE_BLACK_Q, CASTLE_WHITE_K,
    CASTLE_WHITE_Q,
};
use super::zobrist::ZOBRIST;

/// FEN of the standard starting position
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// State needed to take back a move made with `Board::make_move`.
#[derive(Clone, Debug)]
pub struct UnmakeInfo {
    pub(crate) previous_en_passant_target: Option<Square>,
    pub(crate) previous_castling_rights: u8,
    pub(crate) previous_hash: u64,
    pub(crate) previous_halfmove_clock: u32,
    pub(crate) previous_fullmove_number: u32,
    /// Pieces the move removed and added, for incremental NNUE updates
    pub dirty: DirtyPiece,
}

#[derive(Clone, Debug)]
pub struct Board {
    pub(crate) pieces: [[Bitboard; 6]; 2],
    pub(crate) occupied: [Bitboard; 2],
    pub(crate) all_occupied: Bitboard,
    pub(crate) white_to_move: bool,
    pub(crate) en_passant_target: Option<Square>,
    pub(crate) castling_rights: u8, // bitmask
    pub(crate) hash: u64,           // Zobrist hash
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// The standard starting position
    #[must_use]
    pub fn new() -> Self {
        Self::from_fen(START_FEN)
    }

    pub(crate) fn empty() -> Self {
        Board {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            occupied: [Bitboard::EMPTY; 2],
            all_occupied: Bitboard::EMPTY,
            white_to_move: true,
            en_passant_target: None,
            castling_rights: 0,
            hash: 0,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub(crate) fn set_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bit = sq.bit();
        self.pieces[color.index()][piece.index()].0 |= bit;
        self.occupied[color.index()].0 |= bit;
        self.all_occupied.0 |= bit;
    }

    pub(crate) fn remove_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bit = !sq.bit();
        self.pieces[color.index()][piece.index()].0 &= bit;
        self.occupied[color.index()].0 &= bit;
        self.all_occupied.0 &= bit;
    }

    /// Piece and color on a square, if any
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        if !self.all_occupied.contains(sq) {
            return None;
        }
        let color = if self.occupied[0].contains(sq) {
            Color::White
        } else {
            Color::Black
        };
        Piece::ALL
            .into_iter()
            .find(|p| self.pieces[color.index()][p.index()].contains(sq))
            .map(|piece| (color, piece))
    }

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        if self.white_to_move {
            Color::White
        } else {
            Color::Black
        }
    }

    /// Squares holding `color`'s pieces of type `piece`
    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    /// Squares holding any of `color`'s pieces
    #[inline]
    #[must_use]
    pub fn occupied_by(&self, color: Color) -> Bitboard {
        self.occupied[color.index()]
    }

    /// All occupied squares
    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.all_occupied
    }

    /// Square of `color`'s king.
    ///
    /// # Panics
    /// Panics if `color` has no king, which FEN parsing rules out.
    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(color, Piece::King)
            .iter()
            .next()
            .expect("board has no king")
    }

    #[inline]
    #[must_use]
    pub fn count(&self, color: Color, piece: Piece) -> u32 {
        self.pieces(color, piece).popcount()
    }

    /// Number of pieces of a type for both colors
    #[inline]
    #[must_use]
    pub fn count_both(&self, piece: Piece) -> u32 {
        self.count(Color::White, piece) + self.count(Color::Black, piece)
    }

    /// Total number of pieces on the board, kings included
    #[inline]
    #[must_use]
    pub fn piece_count(&self) -> u32 {
        self.all_occupied.popcount()
    }

    /// Reversible half-move counter (fifty-move rule)
    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn en_passant_target(&self) -> Option<Square> {
        self.en_passant_target
    }

    /// Pieces of `by` attacking `sq` given the current occupancy
    #[must_use]
    pub fn attackers_to(&self, sq: Square, by: Color) -> Bitboard {
        let idx = sq.index();
        let occ = self.all_occupied.0;
        let diag = self.pieces(by, Piece::Bishop).0 | self.pieces(by, Piece::Queen).0;
        let straight = self.pieces(by, Piece::Rook).0 | self.pieces(by, Piece::Queen).0;
        let attackers = (PAWN_ATTACKS[by.opponent().index()][idx] & self.pieces(by, Piece::Pawn).0)
            | (KNIGHT_ATTACKS[idx] & self.pieces(by, Piece::Knight).0)
            | (KING_ATTACKS[idx] & self.pieces(by, Piece::King).0)
            | (bishop_attacks(idx, occ) & diag)
            | (rook_attacks(idx, occ) & straight);
        Bitboard(attackers)
    }

    /// Opponent pieces giving check to the side to move
    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        let us = self.side_to_move();
        self.attackers_to(self.king_square(us), us.opponent())
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        !self.checkers().is_empty()
    }

    /// Left-right mirror image: files reflected, pieces and side to move kept.
    ///
    /// Castling rights and the en passant square are dropped, since neither
    /// survives a reflection.
    #[must_use]
    pub fn mirrored(&self) -> Board {
        let mut board = self.clone();
        for bb in board.pieces.iter_mut().flatten() {
            *bb = bb.flip_horizontal();
        }
        for bb in &mut board.occupied {
            *bb = bb.flip_horizontal();
        }
        board.all_occupied = board.all_occupied.flip_horizontal();
        board.castling_rights = 0;
        board.en_passant_target = None;
        board.hash = board.calculate_hash();
        board
    }

    /// Color-swapped image: ranks reflected, colors and side to move swapped.
    #[must_use]
    pub fn color_flipped(&self) -> Board {
        let mut board = self.clone();
        for color in Color::BOTH {
            for piece in Piece::ALL {
                board.pieces[color.opponent().index()][piece.index()] =
                    self.pieces(color, piece).flip_vertical();
            }
            board.occupied[color.opponent().index()] = self.occupied_by(color).flip_vertical();
        }
        board.all_occupied = self.all_occupied.flip_vertical();
        board.white_to_move = !self.white_to_move;
        board.en_passant_target = self.en_passant_target.map(Square::flip_vertical);
        let cr = self.castling_rights;
        board.castling_rights = ((cr & (CASTLE_WHITE_K | CASTLE_WHITE_Q)) << 2)
            | ((cr & (CASTLE_BLACK_K | CASTLE_BLACK_Q)) >> 2);
        board.hash = board.calculate_hash();
        board
    }

    pub(crate) fn calculate_hash(&self) -> u64 {
        let mut hash = 0u64;
        for color in Color::BOTH {
            for piece in Piece::ALL {
                for sq in self.pieces(color, piece).iter() {
                    hash ^= ZOBRIST.piece_keys[piece.index()][color.index()][sq.index()];
                }
            }
        }
        if !self.white_to_move {
            hash ^= ZOBRIST.black_to_move_key;
        }
        hash ^= ZOBRIST.castling_keys[self.castling_rights as usize];
        if let Some(ep) = self.en_passant_target {
            hash ^= ZOBRIST.en_passant_keys[ep.file() as usize];
        }
        hash
    }
}
