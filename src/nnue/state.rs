//! Per-thread accumulator stack.
//!
//! One accumulator per ply for each network size. Pushing a move records
//! its dirty pieces and the threats it made and removed; accumulators are
//! computed lazily when a position is scored, either by replaying updates
//! from the nearest computed ancestor or, past a king move, by a cached
//! refresh.

use super::accumulator::Accumulator;
use super::cache::AccumulatorCache;
use super::features::{requires_refresh, FeatureTransformer};
use super::network::{
    BigAccumulator, Networks, SmallAccumulator, BIG_PSQT_BUCKETS, BIG_WIDTH, SMALL_PSQT_BUCKETS,
    SMALL_WIDTH,
};
use super::threats::{collect_threats, DirtyThreats, Threat};
use crate::board::{Board, Color, DirtyPiece, Move, UnmakeInfo};

#[derive(Clone, Debug)]
struct AccumulatorStack<const W: usize, const B: usize> {
    accumulators: Vec<Accumulator<W, B>>,
    cache: AccumulatorCache<W, B>,
}

impl<const W: usize, const B: usize> AccumulatorStack<W, B> {
    fn new<const T: bool>(ft: &FeatureTransformer<W, B, T>) -> Self {
        AccumulatorStack {
            accumulators: vec![Accumulator::new()],
            cache: AccumulatorCache::new(ft),
        }
    }

    fn reset<const T: bool>(&mut self, ft: &FeatureTransformer<W, B, T>, board: &Board) {
        self.cache.clear(ft);
        self.accumulators.truncate(1);
        let root = &mut self.accumulators[0];
        root.invalidate();
        for perspective in Color::BOTH {
            self.cache.refresh(ft, board, perspective, root);
        }
    }

    fn push(&mut self, ply: usize) {
        if self.accumulators.len() <= ply {
            self.accumulators.push(Accumulator::new());
        } else {
            self.accumulators[ply].invalidate();
        }
    }

    /// Bring the accumulator at `ply` up to date. `dirty[i]` and
    /// `threats[i]` belong to the move leading into ply `i + 1`.
    fn update<const T: bool>(
        &mut self,
        ft: &FeatureTransformer<W, B, T>,
        board: &Board,
        dirty: &[DirtyPiece],
        threats: &[DirtyThreats],
        ply: usize,
    ) -> &Accumulator<W, B> {
        for perspective in Color::BOTH {
            let p = perspective.index();
            if self.accumulators[ply].is_computed(p) {
                continue;
            }

            // Walk back to a computed ancestor unless a king move blocks the way
            let mut start = ply;
            let mut reachable = true;
            while !self.accumulators[start].is_computed(p) {
                if start == 0 || requires_refresh(&dirty[start - 1], perspective) {
                    reachable = false;
                    break;
                }
                start -= 1;
            }

            if reachable {
                let king_sq = board.king_square(perspective);
                for i in start + 1..=ply {
                    let (before, after) = self.accumulators.split_at_mut(i);
                    ft.update(
                        &before[i - 1],
                        &dirty[i - 1],
                        &threats[i - 1],
                        king_sq,
                        perspective,
                        &mut after[0],
                    );
                }
            } else {
                self.cache
                    .refresh(ft, board, perspective, &mut self.accumulators[ply]);
            }
        }
        &self.accumulators[ply]
    }
}

/// Search-node accumulator state owned by one worker thread.
///
/// Tied to the `Networks` it was created or last reset with; call
/// [`NnueState::reset`] after swapping networks.
#[derive(Clone, Debug)]
pub struct NnueState {
    big: AccumulatorStack<BIG_WIDTH, BIG_PSQT_BUCKETS>,
    small: AccumulatorStack<SMALL_WIDTH, SMALL_PSQT_BUCKETS>,
    dirty: Vec<DirtyPiece>,
    /// Sorted threats of each ply's position; entries past the current ply are stale
    threats: Vec<Vec<Threat>>,
    /// Threat changes of the move into each ply, indexed like `dirty`
    dirty_threats: Vec<DirtyThreats>,
}

impl NnueState {
    /// State for `board` as the root position.
    #[must_use]
    pub fn new(nets: &Networks, board: &Board) -> Self {
        let mut state = NnueState {
            big: AccumulatorStack::new(&nets.big.transformer),
            small: AccumulatorStack::new(&nets.small.transformer),
            dirty: Vec::with_capacity(256),
            threats: vec![Vec::new()],
            dirty_threats: Vec::with_capacity(256),
        };
        state.reset(nets, board);
        state
    }

    /// Make `board` the new root: clears the stack and the refresh caches.
    pub fn reset(&mut self, nets: &Networks, board: &Board) {
        self.dirty.clear();
        collect_threats(board, &mut self.threats[0]);
        self.big.reset(&nets.big.transformer, board);
        self.small.reset(&nets.small.transformer, board);
        log::debug!("nnue state reset at {}", board.to_fen());
    }

    /// Number of moves pushed above the root
    #[inline]
    #[must_use]
    pub fn ply(&self) -> usize {
        self.dirty.len()
    }

    /// Record a move just made: its dirty pieces and, from `board` (the
    /// position after the move), the threats it changed.
    pub fn push(&mut self, dirty: DirtyPiece, board: &Board) {
        self.dirty.push(dirty);
        let ply = self.ply();
        if self.threats.len() <= ply {
            self.threats.push(Vec::new());
        }
        if self.dirty_threats.len() < ply {
            self.dirty_threats.push(DirtyThreats::default());
        }
        let (before, after) = self.threats.split_at_mut(ply);
        collect_threats(board, &mut after[0]);
        self.dirty_threats[ply - 1].diff(&before[ply - 1], &after[0]);

        self.big.push(ply);
        self.small.push(ply);
    }

    /// Return to the parent ply.
    ///
    /// # Panics
    ///
    /// Panics at the root.
    pub fn pop(&mut self) {
        assert!(self.dirty.pop().is_some(), "pop at the root of the accumulator stack");
    }

    /// Make `m` on `board` and push its dirty pieces.
    pub fn make_move(&mut self, board: &mut Board, m: Move) -> UnmakeInfo {
        let info = board.make_move(m);
        self.push(info.dirty, board);
        info
    }

    /// Undo a move made with [`NnueState::make_move`].
    pub fn unmake_move(&mut self, board: &mut Board, info: &UnmakeInfo) {
        board.unmake_move(info);
        self.pop();
    }

    /// Big network accumulator for `board`, the position at the current ply.
    pub fn big_accumulator(&mut self, nets: &Networks, board: &Board) -> &BigAccumulator {
        let ply = self.ply();
        self.big.update(
            &nets.big.transformer,
            board,
            &self.dirty,
            &self.dirty_threats,
            ply,
        )
    }

    /// Small network accumulator for `board`, the position at the current ply.
    pub fn small_accumulator(&mut self, nets: &Networks, board: &Board) -> &SmallAccumulator {
        let ply = self.ply();
        self.small.update(
            &nets.small.transformer,
            board,
            &self.dirty,
            &self.dirty_threats,
            ply,
        )
    }
}
