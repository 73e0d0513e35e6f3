//! Move generation, used to drive the evaluator through real games.

use super::attack_tables::{
    bishop_attacks, rook_attacks, KING_ATTACKS, KNIGHT_ATTACKS, PAWN_ATTACKS,
};
use super::state::Board;
use super::types::{Bitboard, Color, Move, Piece, Square};

const PROMOTION_PIECES: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

impl Board {
    fn push_targets(&self, moves: &mut Vec<Move>, from: Square, targets: u64) {
        let them = self.occupied_by(self.side_to_move().opponent());
        for to in Bitboard(targets).iter() {
            if them.contains(to) {
                moves.push(Move::capture(from, to));
            } else {
                moves.push(Move::quiet(from, to));
            }
        }
    }

    fn pawn_moves(&self, moves: &mut Vec<Move>) {
        let us = self.side_to_move();
        let them = self.occupied_by(us.opponent()).0;
        let promo_rank = us.opponent().back_rank();
        let start_rank = if us == Color::White { 1 } else { 6 };

        for from in self.pieces(us, Piece::Pawn).iter() {
            let mut targets: Vec<(Square, bool)> = Vec::with_capacity(3);
            let forward = match us {
                Color::White => from.index() + 8,
                Color::Black => from.index().wrapping_sub(8),
            };
            if forward < 64 {
                let one = Square::from_index(forward);
                if !self.occupied().contains(one) {
                    targets.push((one, false));
                    if from.rank() == start_rank {
                        let two = match us {
                            Color::White => Square::from_index(forward + 8),
                            Color::Black => Square::from_index(forward - 8),
                        };
                        if !self.occupied().contains(two) {
                            moves.push(Move::double_pawn_push(from, two));
                        }
                    }
                }
            }
            let attacks = PAWN_ATTACKS[us.index()][from.index()];
            for to in Bitboard(attacks & them).iter() {
                targets.push((to, true));
            }
            if let Some(ep) = self.en_passant_target {
                if attacks & ep.bit() != 0 {
                    moves.push(Move::en_passant(from, ep));
                }
            }

            for (to, capture) in targets {
                if to.rank() == promo_rank {
                    for piece in PROMOTION_PIECES {
                        moves.push(Move::promotion(from, to, piece, capture));
                    }
                } else if capture {
                    moves.push(Move::capture(from, to));
                } else {
                    moves.push(Move::quiet(from, to));
                }
            }
        }
    }

    fn castling_moves(&self, moves: &mut Vec<Move>) {
        let us = self.side_to_move();
        let them = us.opponent();
        let rank = us.back_rank();
        let king = self.king_square(us);
        if king.rank() != rank || king.file() != 4 || self.in_check() {
            return;
        }
        let sq = |file: u8| Square::from_index((rank * 8 + file) as usize);
        let rook = self.pieces(us, Piece::Rook);

        // (side, rook file, squares that must be empty, squares the king crosses)
        let sides: [(char, u8, &[u8], [u8; 2]); 2] =
            [('K', 7, &[5, 6], [5, 6]), ('Q', 0, &[1, 2, 3], [3, 2])];
        for (side, rook_file, between, crossed) in sides {
            if self.castling_rights & super::types::castle_bit(us, side) == 0
                || !rook.contains(sq(rook_file))
                || between.iter().any(|&f| self.occupied().contains(sq(f)))
                || crossed
                    .iter()
                    .any(|&f| !self.attackers_to(sq(f), them).is_empty())
            {
                continue;
            }
            moves.push(Move::castle(king, sq(crossed[1])));
        }
    }

    /// Moves that obey piece movement rules, ignoring checks on the own king
    #[must_use]
    pub fn pseudo_legal_moves(&self) -> Vec<Move> {
        let us = self.side_to_move();
        let own = self.occupied_by(us).0;
        let occ = self.occupied().0;
        let mut moves = Vec::with_capacity(64);

        self.pawn_moves(&mut moves);
        for from in self.pieces(us, Piece::Knight).iter() {
            self.push_targets(&mut moves, from, KNIGHT_ATTACKS[from.index()] & !own);
        }
        for from in self.pieces(us, Piece::Bishop).iter() {
            self.push_targets(&mut moves, from, bishop_attacks(from.index(), occ) & !own);
        }
        for from in self.pieces(us, Piece::Rook).iter() {
            self.push_targets(&mut moves, from, rook_attacks(from.index(), occ) & !own);
        }
        for from in self.pieces(us, Piece::Queen).iter() {
            let attacks = bishop_attacks(from.index(), occ) | rook_attacks(from.index(), occ);
            self.push_targets(&mut moves, from, attacks & !own);
        }
        let king = self.king_square(us);
        self.push_targets(&mut moves, king, KING_ATTACKS[king.index()] & !own);
        self.castling_moves(&mut moves);
        moves
    }

    /// Fully legal moves for the side to move.
    ///
    /// A king is never captured, even in a position where the side not to
    /// move is left in check.
    #[must_use]
    pub fn legal_moves(&self) -> Vec<Move> {
        let us = self.side_to_move();
        let their_king = self.king_square(us.opponent());
        let mut scratch = self.clone();
        self.pseudo_legal_moves()
            .into_iter()
            .filter(|&mv| mv.to() != their_king)
            .filter(|&mv| {
                let info = scratch.make_move(mv);
                let legal = scratch
                    .attackers_to(scratch.king_square(us), us.opponent())
                    .is_empty();
                scratch.unmake_move(&info);
                legal
            })
            .collect()
    }
}
