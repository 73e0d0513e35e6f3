//! Feature addressing and the feature transformer.
//!
//! Each (perspective, piece, square) maps to one of 768 input features. The
//! board is seen from the perspective's side (ranks flipped for Black) and
//! mirrored left-right whenever that side's king stands on files e-h, so the
//! king always sits on the a-d half. A transformer built with `THREATS` also
//! takes the threat features of [`super::threats`] after those 768.

use std::io::{self, Read, Write};

use super::accumulator::Accumulator;
use super::io::{read_i16_vec, read_i32_vec, write_i16_slice, write_i32_slice};
use super::simd;
use super::threats::{for_each_threat, threat_index, DirtyThreats, THREAT_INPUTS};
use crate::board::{Board, Color, DirtyPiece, Piece, Square};

/// Number of piece-square features per perspective
pub const FEATURE_COUNT: usize = 768;

/// Feature set hash of the piece-square features alone
pub const PIECE_SQUARE_HASH: u32 = 0x5D69_D5B8;
/// Feature set hash of piece-square plus threat features
pub const THREAT_HASH: u32 = 0x7F23_4CB8;

/// King buckets per perspective (mirrored relative king squares)
pub const KING_BUCKETS: usize = 32;

/// True if `perspective`'s features are mirrored for its king on `king_sq`
#[inline]
#[must_use]
pub const fn is_mirrored(king_sq: Square) -> bool {
    king_sq.file() > 3
}

/// Square as seen in the oriented frame of `perspective`
#[inline]
#[must_use]
pub const fn orient(perspective: Color, king_sq: Square, sq: Square) -> Square {
    let sq = if is_mirrored(king_sq) {
        sq.flip_horizontal()
    } else {
        sq
    };
    match perspective {
        Color::White => sq,
        Color::Black => sq.flip_vertical(),
    }
}

/// Feature index for a piece already placed in the oriented frame.
#[inline]
#[must_use]
pub const fn oriented_index(perspective: Color, color: Color, piece: Piece, oriented: Square) -> usize {
    let theirs = (color.index() != perspective.index()) as usize;
    theirs * 384 + piece.index() * 64 + oriented.index()
}

/// Feature index of `color`'s `piece` on `sq`, seen by `perspective` whose
/// king stands on `king_sq`.
#[inline]
#[must_use]
pub const fn feature_index(
    perspective: Color,
    king_sq: Square,
    color: Color,
    piece: Piece,
    sq: Square,
) -> usize {
    oriented_index(perspective, color, piece, orient(perspective, king_sq, sq))
}

/// Cache bucket for `perspective`'s king on `king_sq`.
#[inline]
#[must_use]
pub const fn king_bucket(perspective: Color, king_sq: Square) -> usize {
    let rel = orient(perspective, king_sq, king_sq);
    rel.rank() as usize * 4 + rel.file() as usize
}

/// True if the move lifted `perspective`'s king, which invalidates every
/// feature of that perspective.
#[inline]
#[must_use]
pub fn requires_refresh(dirty: &DirtyPiece, perspective: Color) -> bool {
    dirty.moves_king(perspective)
}

/// Active feature indices of the board for `perspective`
pub fn active_features(board: &Board, perspective: Color) -> impl Iterator<Item = usize> + '_ {
    let king_sq = board.king_square(perspective);
    Color::BOTH.into_iter().flat_map(move |color| {
        Piece::ALL.into_iter().flat_map(move |piece| {
            board
                .pieces(color, piece)
                .iter()
                .map(move |sq| feature_index(perspective, king_sq, color, piece, sq))
        })
    })
}

/// First layer weights: one `W`-wide i16 row and `B` PSQT values per feature.
///
/// `THREATS` selects the input set: 768 piece-square features, or those
/// followed by the threat features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureTransformer<const W: usize, const B: usize, const THREATS: bool = false> {
    pub(crate) biases: Vec<i16>,
    /// `[feature][W]`, piece-square rows first
    pub(crate) weights: Vec<i16>,
    pub(crate) psqt_weights: Vec<i32>,
}

impl<const W: usize, const B: usize, const THREATS: bool> FeatureTransformer<W, B, THREATS> {
    /// Input features per perspective
    pub const INPUTS: usize = if THREATS { THREAT_INPUTS } else { FEATURE_COUNT };

    /// Structural hash written ahead of the transformer's parameters
    pub const HASH: u32 = (if THREATS { THREAT_HASH } else { PIECE_SQUARE_HASH }) ^ (W as u32 * 2);

    #[must_use]
    pub fn new(biases: Vec<i16>, weights: Vec<i16>, psqt_weights: Vec<i32>) -> Self {
        assert_eq!(biases.len(), W);
        assert_eq!(weights.len(), Self::INPUTS * W);
        assert_eq!(psqt_weights.len(), Self::INPUTS * B);
        FeatureTransformer {
            biases,
            weights,
            psqt_weights,
        }
    }

    #[inline]
    #[must_use]
    pub fn biases(&self) -> &[i16] {
        &self.biases
    }

    #[inline]
    #[must_use]
    pub fn row(&self, index: usize) -> &[i16] {
        &self.weights[index * W..(index + 1) * W]
    }

    #[inline]
    #[must_use]
    pub fn psqt_row(&self, index: usize) -> &[i32] {
        &self.psqt_weights[index * B..(index + 1) * B]
    }

    #[inline]
    pub(crate) fn add_feature(&self, values: &mut [i16; W], psqt: &mut [i32; B], index: usize) {
        simd::add_weights(values, self.row(index));
        for (p, &w) in psqt.iter_mut().zip(self.psqt_row(index)) {
            *p = p.wrapping_add(w);
        }
    }

    #[inline]
    pub(crate) fn sub_feature(&self, values: &mut [i16; W], psqt: &mut [i32; B], index: usize) {
        simd::sub_weights(values, self.row(index));
        for (p, &w) in psqt.iter_mut().zip(self.psqt_row(index)) {
            *p = p.wrapping_sub(w);
        }
    }

    /// Add every threat feature of `board` to one perspective's values.
    /// Does nothing without `THREATS`.
    pub(crate) fn add_threats(
        &self,
        board: &Board,
        perspective: Color,
        values: &mut [i16; W],
        psqt: &mut [i32; B],
    ) {
        if !THREATS {
            return;
        }
        let king_sq = board.king_square(perspective);
        for_each_threat(board, |threat| {
            self.add_feature(values, psqt, threat_index(perspective, king_sq, threat));
        });
    }

    /// Recompute `perspective`'s half of `acc` from scratch.
    pub fn refresh(&self, board: &Board, perspective: Color, acc: &mut Accumulator<W, B>) {
        let p = perspective.index();
        acc.values[p].copy_from_slice(&self.biases);
        acc.psqt[p] = [0; B];
        let (values, psqt) = (&mut acc.values[p], &mut acc.psqt[p]);
        for index in active_features(board, perspective) {
            self.add_feature(values, psqt, index);
        }
        self.add_threats(board, perspective, values, psqt);
        acc.computed[p] = true;
    }

    /// Derive `perspective`'s half of `acc` from `prev` and one move's changes.
    ///
    /// `king_sq` is the perspective's king square after the move. The move
    /// must not have moved that king. `threats` is ignored without `THREATS`.
    pub fn update(
        &self,
        prev: &Accumulator<W, B>,
        dirty: &DirtyPiece,
        threats: &DirtyThreats,
        king_sq: Square,
        perspective: Color,
        acc: &mut Accumulator<W, B>,
    ) {
        debug_assert!(
            !requires_refresh(dirty, perspective),
            "incremental update across a king move"
        );
        debug_assert!(prev.computed[perspective.index()]);

        let p = perspective.index();
        acc.values[p] = prev.values[p];
        acc.psqt[p] = prev.psqt[p];
        let (values, psqt) = (&mut acc.values[p], &mut acc.psqt[p]);
        for change in dirty.removed() {
            let index = feature_index(perspective, king_sq, change.color, change.piece, change.square);
            self.sub_feature(values, psqt, index);
        }
        for change in dirty.added() {
            let index = feature_index(perspective, king_sq, change.color, change.piece, change.square);
            self.add_feature(values, psqt, index);
        }
        if THREATS {
            for &threat in &threats.removed {
                self.sub_feature(values, psqt, threat_index(perspective, king_sq, threat));
            }
            for &threat in &threats.added {
                self.add_feature(values, psqt, threat_index(perspective, king_sq, threat));
            }
        }
        acc.computed[p] = true;
    }

    /// Read the transformer parameters (after its hash).
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let biases = read_i16_vec(reader, W)?;
        let weights = read_i16_vec(reader, Self::INPUTS * W)?;
        let psqt_weights = read_i32_vec(reader, Self::INPUTS * B)?;
        Ok(FeatureTransformer {
            biases,
            weights,
            psqt_weights,
        })
    }

    pub fn write<Wr: Write>(&self, writer: &mut Wr) -> io::Result<()> {
        write_i16_slice(writer, &self.biases)?;
        write_i16_slice(writer, &self.weights)?;
        write_i32_slice(writer, &self.psqt_weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_feature_index_white_king_left_half() {
        // White pawn on e2, white king on d1: no mirroring
        let idx = feature_index(Color::White, sq("d1"), Color::White, Piece::Pawn, sq("e2"));
        assert_eq!(idx, 12);
        // Same pawn seen by Black (king e8 -> mirrored, ranks flipped)
        let idx = feature_index(Color::Black, sq("e8"), Color::White, Piece::Pawn, sq("e2"));
        assert_eq!(idx, 384 + sq("d7").index());
    }

    #[test]
    fn test_feature_index_mirrors_with_king_file() {
        let left = feature_index(Color::White, sq("c1"), Color::Black, Piece::Queen, sq("b5"));
        let right = feature_index(Color::White, sq("f1"), Color::Black, Piece::Queen, sq("g5"));
        assert_eq!(left, right);
        assert_eq!(left, 384 + 4 * 64 + sq("b5").index());
    }

    #[test]
    fn test_feature_index_in_range() {
        for king in 0..64 {
            for piece_sq in 0..64 {
                for color in Color::BOTH {
                    for piece in Piece::ALL {
                        for perspective in Color::BOTH {
                            let idx = feature_index(
                                perspective,
                                Square::from_index(king),
                                color,
                                piece,
                                Square::from_index(piece_sq),
                            );
                            assert!(idx < FEATURE_COUNT);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_king_buckets() {
        assert_eq!(king_bucket(Color::White, sq("a1")), 0);
        assert_eq!(king_bucket(Color::White, sq("h1")), 0);
        assert_eq!(king_bucket(Color::White, sq("e1")), 3);
        assert_eq!(king_bucket(Color::Black, sq("e8")), 3);
        assert_eq!(king_bucket(Color::Black, sq("d1")), 31);
        let max = (0..64)
            .map(|i| king_bucket(Color::White, Square::from_index(i)))
            .max();
        assert_eq!(max, Some(KING_BUCKETS - 1));
    }

    #[test]
    fn test_requires_refresh_only_for_own_king() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let castle = board.parse_move("e1g1").unwrap();
        let info = board.make_move(castle);
        assert!(requires_refresh(&info.dirty, Color::White));
        assert!(!requires_refresh(&info.dirty, Color::Black));

        let rook = board.parse_move("a8a1").unwrap();
        let info = board.make_move(rook);
        assert!(!requires_refresh(&info.dirty, Color::White));
        assert!(!requires_refresh(&info.dirty, Color::Black));
    }

    #[test]
    fn test_feature_set_hashes() {
        assert_eq!(FeatureTransformer::<64, 1>::INPUTS, FEATURE_COUNT);
        assert_eq!(FeatureTransformer::<256, 8, true>::INPUTS, 15776);
        assert_eq!(FeatureTransformer::<256, 8, true>::HASH, 0x7F23_4CB8 ^ 512);
        assert_eq!(FeatureTransformer::<64, 1>::HASH, 0x5D69_D5B8 ^ 128);
    }

    #[test]
    fn test_threat_rows_join_the_refresh() {
        // Unit weights on every row: each active feature adds one
        let ft = FeatureTransformer::<16, 1, true>::new(
            vec![0; 16],
            vec![1; THREAT_INPUTS * 16],
            vec![1; THREAT_INPUTS],
        );
        let board = Board::new();
        let mut acc = Accumulator::new();
        ft.refresh(&board, Color::White, &mut acc);
        // 32 pieces plus 40 guarded squares
        assert_eq!(acc.values(0)[0], 72);
        assert_eq!(acc.psqt(0)[0], 72);

        let plain = FeatureTransformer::<16, 1>::new(vec![0; 16], vec![1; FEATURE_COUNT * 16], vec![1; FEATURE_COUNT]);
        plain.refresh(&board, Color::White, &mut acc);
        assert_eq!(acc.values(0)[0], 32);
    }

    #[test]
    fn test_active_features_count() {
        let board = Board::new();
        assert_eq!(active_features(&board, Color::White).count(), 32);
        let mut seen: Vec<usize> = active_features(&board, Color::Black).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 32);
    }
}
