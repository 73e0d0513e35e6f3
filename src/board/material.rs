//! Material counting and the classical piece-square score.
//!
//! Square bonuses are written from White's point of view, rank 1 first.
//! Piece tables cover files a-d and are mirrored onto e-h; the pawn table
//! is asymmetric and covers the whole board.

use super::state::Board;
use super::types::{Color, Piece, Square};

#[rustfmt::skip]
const PIECE_BONUS: [[[i32; 4]; 8]; 4] = [
    // Knight
    [
        [-96, -65, -49, -21], [-67, -54, -18, 8], [-40, -27, -8, 29], [-35, -2, 13, 28],
        [-45, -16, 9, 39], [-51, -44, -16, 17], [-69, -50, -51, 12], [-100, -88, -56, -17],
    ],
    // Bishop
    [
        [-40, -21, -26, -8], [-26, -9, -12, 1], [-11, -1, -1, 7], [-14, -4, 0, 12],
        [-12, -1, -10, 11], [-21, 4, 3, 4], [-22, -14, -1, 1], [-32, -29, -26, -17],
    ],
    // Rook
    [
        [-9, -13, -10, -9], [-12, -9, -1, -2], [6, -8, -2, -6], [-6, 1, -9, 7],
        [-5, 8, 7, -6], [6, 1, -7, 10], [4, 5, 20, -5], [18, 0, 19, 13],
    ],
    // Queen
    [
        [-69, -57, -47, -26], [-54, -31, -22, -4], [-39, -18, -9, 3], [-23, -3, 13, 24],
        [-29, -6, 9, 21], [-38, -18, -11, 1], [-50, -27, -24, -8], [-74, -52, -43, -34],
    ],
];

#[rustfmt::skip]
const KING_BONUS: [[i32; 4]; 8] = [
    [1, 45, 85, 76], [53, 100, 133, 135], [88, 130, 169, 175], [103, 156, 172, 172],
    [96, 166, 199, 199], [92, 172, 184, 191], [47, 121, 116, 131], [11, 59, 73, 78],
];

#[rustfmt::skip]
const PAWN_BONUS: [[i32; 8]; 8] = [
    [0; 8],
    [-8, -6, 9, 5, 16, 6, -6, -18],
    [-9, -7, -10, 5, 2, 3, -8, -5],
    [7, 1, -8, -2, -14, -13, -11, -6],
    [12, 6, 2, -6, -5, -4, 14, 9],
    [27, 18, 19, 29, 30, 9, 8, 14],
    [-1, -14, 13, 22, 24, 17, 7, 7],
    [0; 8],
];

/// Square bonus for a piece of `color` on `sq`
fn square_bonus(color: Color, piece: Piece, sq: Square) -> i32 {
    let sq = if color == Color::White {
        sq
    } else {
        sq.flip_vertical()
    };
    let (rank, file) = (sq.rank() as usize, sq.file() as usize);
    let edge_file = file.min(7 - file);
    match piece {
        Piece::Pawn => PAWN_BONUS[rank][file],
        Piece::King => KING_BONUS[rank][edge_file],
        _ => PIECE_BONUS[piece.index() - 1][rank][edge_file],
    }
}

impl Board {
    /// Summed value of `color`'s knights, bishops, rooks and queens
    #[must_use]
    pub fn non_pawn_material(&self, color: Color) -> i32 {
        Piece::NON_PAWN
            .iter()
            .map(|&p| p.value() * self.count(color, p) as i32)
            .sum()
    }

    /// Non-pawn material of both sides
    #[must_use]
    pub fn non_pawn_material_total(&self) -> i32 {
        self.non_pawn_material(Color::White) + self.non_pawn_material(Color::Black)
    }

    /// Material balance from `color`'s point of view
    #[must_use]
    pub fn simple_eval(&self, color: Color) -> i32 {
        let them = color.opponent();
        Piece::Pawn.value() * (self.count(color, Piece::Pawn) as i32 - self.count(them, Piece::Pawn) as i32)
            + self.non_pawn_material(color)
            - self.non_pawn_material(them)
    }

    /// Material plus piece-square bonuses, from the side to move's point of view.
    #[must_use]
    pub fn classical_eval(&self) -> i32 {
        let mut white_score = 0;
        for color in Color::BOTH {
            for piece in Piece::ALL {
                let side_total: i32 = self
                    .pieces(color, piece)
                    .iter()
                    .map(|sq| piece.value() + square_bonus(color, piece, sq))
                    .sum();
                white_score += color.sign() * side_total;
            }
        }
        self.side_to_move().sign() * white_score
    }
}
