//! Refresh cache keyed by (perspective, king bucket).
//!
//! Each entry remembers an accumulator half together with the piece
//! placement, in the perspective's oriented frame, that produced it. A
//! refresh applies only the difference between that placement and the
//! current board, then stores the result back. Threat features depend on
//! the whole board, so they are never cached and are added on every refresh.

use super::accumulator::Accumulator;
use super::features::{king_bucket, oriented_index, FeatureTransformer, KING_BUCKETS};
use crate::board::{Bitboard, Board, Color, Piece};

#[derive(Clone, Debug)]
struct CacheEntry<const W: usize, const B: usize> {
    values: [i16; W],
    psqt: [i32; B],
    /// `pieces[color][piece]`, oriented for the entry's perspective
    pieces: [[Bitboard; 6]; 2],
}

/// Per-thread refresh cache for one network size.
#[derive(Clone, Debug)]
pub struct AccumulatorCache<const W: usize, const B: usize> {
    entries: Vec<CacheEntry<W, B>>,
}

impl<const W: usize, const B: usize> AccumulatorCache<W, B> {
    /// A cache whose entries all hold the bias of an empty board
    #[must_use]
    pub fn new<const T: bool>(ft: &FeatureTransformer<W, B, T>) -> Self {
        let mut cache = AccumulatorCache {
            entries: Vec::with_capacity(2 * KING_BUCKETS),
        };
        cache.clear(ft);
        cache
    }

    /// Reset every entry to the bias of an empty board.
    pub fn clear<const T: bool>(&mut self, ft: &FeatureTransformer<W, B, T>) {
        let mut values = [0i16; W];
        values.copy_from_slice(ft.biases());
        self.entries.clear();
        self.entries.resize(
            2 * KING_BUCKETS,
            CacheEntry {
                values,
                psqt: [0; B],
                pieces: [[Bitboard::EMPTY; 6]; 2],
            },
        );
    }

    /// Refresh `perspective`'s half of `acc` through the cache.
    ///
    /// Produces exactly what `FeatureTransformer::refresh` would.
    pub fn refresh<const T: bool>(
        &mut self,
        ft: &FeatureTransformer<W, B, T>,
        board: &Board,
        perspective: Color,
        acc: &mut Accumulator<W, B>,
    ) {
        let king_sq = board.king_square(perspective);
        let bucket = king_bucket(perspective, king_sq);
        let entry = &mut self.entries[perspective.index() * KING_BUCKETS + bucket];

        let mirrored = super::features::is_mirrored(king_sq);
        let mut changed = 0u32;
        for color in Color::BOTH {
            for piece in Piece::ALL {
                let mut current = board.pieces(color, piece);
                if mirrored {
                    current = current.flip_horizontal();
                }
                if perspective == Color::Black {
                    current = current.flip_vertical();
                }
                let cached = entry.pieces[color.index()][piece.index()];

                for sq in cached.without(current).iter() {
                    let index = oriented_index(perspective, color, piece, sq);
                    ft.sub_feature(&mut entry.values, &mut entry.psqt, index);
                    changed += 1;
                }
                for sq in current.without(cached).iter() {
                    let index = oriented_index(perspective, color, piece, sq);
                    ft.add_feature(&mut entry.values, &mut entry.psqt, index);
                    changed += 1;
                }
                entry.pieces[color.index()][piece.index()] = current;
            }
        }
        log::trace!("cache refresh {perspective} bucket {bucket}: {changed} feature changes");

        let p = perspective.index();
        acc.values[p] = entry.values;
        acc.psqt[p] = entry.psqt;
        ft.add_threats(board, perspective, &mut acc.values[p], &mut acc.psqt[p]);
        acc.computed[p] = true;
    }
}
