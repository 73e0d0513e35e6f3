//! Attack tables used for check detection and threat features.
//!
//! Leapers use precomputed tables; sliders use Hyperbola Quintessence
//! (the `o^(o-2r)` trick) with a small lookup table for rank attacks.

use once_cell::sync::Lazy;

use super::types::{Bitboard, Color, Piece, Square};

const FILE_A: u64 = 0x0101_0101_0101_0101;

fn leaper_table(deltas: &[(i8, i8)]) -> [u64; 64] {
    let mut attacks = [0u64; 64];
    for (sq, slot) in attacks.iter_mut().enumerate() {
        let r = (sq / 8) as i8;
        let f = (sq % 8) as i8;
        for &(dr, df) in deltas {
            let (nr, nf) = (r + dr, f + df);
            if (0..8).contains(&nr) && (0..8).contains(&nf) {
                *slot |= 1u64 << (nr * 8 + nf);
            }
        }
    }
    attacks
}

pub(crate) static KNIGHT_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    leaper_table(&[(2, 1), (1, 2), (-1, 2), (-2, 1), (-2, -1), (-1, -2), (1, -2), (2, -1)])
});

pub(crate) static KING_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    leaper_table(&[(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)])
});

/// `PAWN_ATTACKS[color][sq]`: squares attacked by a pawn of `color` on `sq`
pub(crate) static PAWN_ATTACKS: Lazy<[[u64; 64]; 2]> =
    Lazy::new(|| [leaper_table(&[(1, -1), (1, 1)]), leaper_table(&[(-1, -1), (-1, 1)])]);

fn line_mask(sq: usize, dr: i8, df: i8) -> u64 {
    let mut mask = 1u64 << sq;
    for sign in [1, -1] {
        let (mut r, mut f) = ((sq / 8) as i8 + sign * dr, (sq % 8) as i8 + sign * df);
        while (0..8).contains(&r) && (0..8).contains(&f) {
            mask |= 1u64 << (r * 8 + f);
            r += sign * dr;
            f += sign * df;
        }
    }
    mask
}

/// `[diagonal, anti-diagonal, file]` masks per square
static LINE_MASKS: Lazy<[[u64; 3]; 64]> = Lazy::new(|| {
    let mut masks = [[0u64; 3]; 64];
    for (sq, slot) in masks.iter_mut().enumerate() {
        *slot = [line_mask(sq, 1, 1), line_mask(sq, 1, -1), FILE_A << (sq % 8)];
    }
    masks
});

/// Rank attack lookup: `[8 * occupancy_6bit + file]` -> attacks on rank 0
static RANK_ATTACKS: Lazy<[u64; 512]> = Lazy::new(|| {
    let mut attacks = [0u64; 512];
    for occ_6bit in 0..64usize {
        let occ = (occ_6bit as u64) << 1;
        for file in 0..8 {
            let mut attack = 0u64;
            for f in (file + 1)..8 {
                attack |= 1 << f;
                if occ & (1 << f) != 0 {
                    break;
                }
            }
            for f in (0..file).rev() {
                attack |= 1 << f;
                if occ & (1 << f) != 0 {
                    break;
                }
            }
            attacks[8 * occ_6bit + file] = attack;
        }
    }
    attacks
});

#[inline]
fn hyp_quint(occupied: u64, mask: u64, square: usize) -> u64 {
    let piece_bit = 1u64 << square;
    let mask_ex = mask & !piece_bit;
    let forward = occupied & mask_ex;
    let backward = forward.swap_bytes();
    let forward_attacks = forward.wrapping_sub(piece_bit);
    let backward_attacks = backward.wrapping_sub(piece_bit.swap_bytes()).swap_bytes();
    (forward_attacks ^ backward_attacks) & mask_ex
}

#[inline]
fn rank_attacks(occupied: u64, square: usize) -> u64 {
    let rank = square / 8;
    let occ_6bit = ((occupied >> (rank * 8 + 1)) & 63) as usize;
    RANK_ATTACKS[8 * occ_6bit + square % 8] << (rank * 8)
}

#[inline]
pub(crate) fn bishop_attacks(square: usize, occupied: u64) -> u64 {
    let masks = &LINE_MASKS[square];
    hyp_quint(occupied, masks[0], square) | hyp_quint(occupied, masks[1], square)
}

#[inline]
pub(crate) fn rook_attacks(square: usize, occupied: u64) -> u64 {
    hyp_quint(occupied, LINE_MASKS[square][2], square) | rank_attacks(occupied, square)
}

/// Squares attacked by `color`'s `piece` on `sq`, sliders stopped by `occupied`.
#[must_use]
pub fn piece_attacks(color: Color, piece: Piece, sq: Square, occupied: Bitboard) -> Bitboard {
    let idx = sq.index();
    let attacks = match piece {
        Piece::Pawn => PAWN_ATTACKS[color.index()][idx],
        Piece::Knight => KNIGHT_ATTACKS[idx],
        Piece::Bishop => bishop_attacks(idx, occupied.0),
        Piece::Rook => rook_attacks(idx, occupied.0),
        Piece::Queen => bishop_attacks(idx, occupied.0) | rook_attacks(idx, occupied.0),
        Piece::King => KING_ATTACKS[idx],
    };
    Bitboard(attacks)
}
