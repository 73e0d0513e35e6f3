//! Threat features of the big network.
//!
//! Every attack of a piece on an occupied square is one feature, addressed
//! by the attacker (color relative to the perspective, type, origin), the
//! attacked square, and whether the attacked piece belongs to the other
//! side. The attacked piece's type is not part of the address. Squares are
//! oriented exactly as for the piece-square features, so a threat feature
//! changes only when the attack itself appears or disappears.
//!
//! Threat indices follow the 768 piece-square features:
//! `768 + enemy · ATTACK_PAIRS + offset(color, piece, from) + rank(to)`,
//! where `rank(to)` counts the empty-board targets of `from` below `to`.

use std::cmp::Ordering;

use once_cell::sync::Lazy;

use super::features::{orient, FEATURE_COUNT};
use crate::board::{piece_attacks, Bitboard, Board, Color, Piece, Square};

/// Empty-board (color, piece, from, to) attack combinations. Pawns only
/// attack from the second to the seventh rank.
pub const ATTACK_PAIRS: usize = 7504;

/// Threat features per perspective: every attack pair, against a friend or a foe
pub const THREAT_FEATURES: usize = 2 * ATTACK_PAIRS;

/// Piece-square and threat features together
pub const THREAT_INPUTS: usize = FEATURE_COUNT + THREAT_FEATURES;

struct ThreatTable {
    /// `[relative color][piece][square]`, White moving up the board
    attacks: [[[u64; 64]; 6]; 2],
    /// First attack pair of each `[relative color][piece][square]`
    offsets: [[[u16; 64]; 6]; 2],
}

fn pseudo_attacks(color: Color, piece: Piece, sq: Square) -> u64 {
    if piece == Piece::Pawn && matches!(sq.rank(), 0 | 7) {
        return 0;
    }
    piece_attacks(color, piece, sq, Bitboard::EMPTY).0
}

static TABLE: Lazy<ThreatTable> = Lazy::new(|| {
    let mut table = ThreatTable {
        attacks: [[[0; 64]; 6]; 2],
        offsets: [[[0; 64]; 6]; 2],
    };
    let mut next = 0u32;
    for color in Color::BOTH {
        for piece in Piece::ALL {
            for i in 0..64 {
                let attacks = pseudo_attacks(color, piece, Square::from_index(i));
                table.attacks[color.index()][piece.index()][i] = attacks;
                table.offsets[color.index()][piece.index()][i] = next as u16;
                next += attacks.count_ones();
            }
        }
    }
    debug_assert_eq!(next as usize, ATTACK_PAIRS);
    table
});

/// One piece attacking an occupied square, independent of perspective.
///
/// Packed as `attacker color | piece | from | victim color | to`, so
/// threats sort by attacker first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Threat(u32);

impl Threat {
    #[inline]
    #[must_use]
    pub const fn new(color: Color, piece: Piece, from: Square, victim: Color, to: Square) -> Self {
        Threat(
            (color.index() as u32) << 16
                | (piece.index() as u32) << 13
                | (from.index() as u32) << 7
                | (victim.index() as u32) << 6
                | to.index() as u32,
        )
    }

    #[inline]
    #[must_use]
    pub const fn color(self) -> Color {
        Color::BOTH[(self.0 >> 16) as usize & 1]
    }

    #[inline]
    #[must_use]
    pub const fn piece(self) -> Piece {
        Piece::ALL[(self.0 >> 13) as usize & 7]
    }

    #[inline]
    #[must_use]
    pub const fn from(self) -> Square {
        Square::from_index((self.0 >> 7) as usize & 63)
    }

    /// Color of the attacked piece
    #[inline]
    #[must_use]
    pub const fn victim(self) -> Color {
        Color::BOTH[(self.0 >> 6) as usize & 1]
    }

    #[inline]
    #[must_use]
    pub const fn to(self) -> Square {
        Square::from_index(self.0 as usize & 63)
    }
}

impl std::fmt::Debug for Threat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}x{}",
            self.piece().to_fen_char(self.color()),
            self.from(),
            if self.color() == self.victim() { "=" } else { "" },
            self.to()
        )
    }
}

/// Call `f` on every threat of `board`.
pub fn for_each_threat(board: &Board, mut f: impl FnMut(Threat)) {
    let occupied = board.occupied();
    for color in Color::BOTH {
        let own = board.occupied_by(color);
        for piece in Piece::ALL {
            for from in board.pieces(color, piece).iter() {
                if piece == Piece::Pawn && matches!(from.rank(), 0 | 7) {
                    continue;
                }
                let targets = piece_attacks(color, piece, from, occupied) & occupied;
                for to in targets.iter() {
                    let victim = if own.contains(to) { color } else { color.opponent() };
                    f(Threat::new(color, piece, from, victim, to));
                }
            }
        }
    }
}

/// Every threat of `board`, sorted, replacing the contents of `out`.
pub fn collect_threats(board: &Board, out: &mut Vec<Threat>) {
    out.clear();
    for_each_threat(board, |t| out.push(t));
    out.sort_unstable();
}

/// Feature index of `threat` seen by `perspective` whose king stands on `king_sq`.
#[inline]
#[must_use]
pub fn threat_index(perspective: Color, king_sq: Square, threat: Threat) -> usize {
    let rel = usize::from(threat.color() != perspective);
    let piece = threat.piece().index();
    let from = orient(perspective, king_sq, threat.from()).index();
    let to = orient(perspective, king_sq, threat.to());
    let enemy = usize::from(threat.victim() != threat.color());

    let table = &*TABLE;
    let pseudo = table.attacks[rel][piece][from];
    debug_assert!(pseudo & to.bit() != 0, "{threat:?} is not an attack");
    let below = (pseudo & (to.bit() - 1)).count_ones() as usize;
    FEATURE_COUNT + enemy * ATTACK_PAIRS + usize::from(table.offsets[rel][piece][from]) + below
}

/// Threats that appeared and disappeared between two positions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirtyThreats {
    pub removed: Vec<Threat>,
    pub added: Vec<Threat>,
}

impl DirtyThreats {
    /// Recompute from two sorted threat lists.
    pub fn diff(&mut self, before: &[Threat], after: &[Threat]) {
        self.removed.clear();
        self.added.clear();
        let (mut i, mut j) = (0, 0);
        while i < before.len() && j < after.len() {
            match before[i].cmp(&after[j]) {
                Ordering::Less => {
                    self.removed.push(before[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    self.added.push(after[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        self.removed.extend_from_slice(&before[i..]);
        self.added.extend_from_slice(&after[j..]);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    fn threats(board: &Board) -> Vec<Threat> {
        let mut out = Vec::new();
        collect_threats(board, &mut out);
        out
    }

    #[test]
    fn test_attack_pair_table() {
        let table = &*TABLE;
        let per_color: u32 = table.attacks[0].iter().flatten().map(|a| a.count_ones()).sum();
        assert_eq!(per_color as usize * 2, ATTACK_PAIRS);
        assert_eq!(THREAT_INPUTS, 15776);
        let last = usize::from(table.offsets[1][5][63]) + table.attacks[1][5][63].count_ones() as usize;
        assert_eq!(last, ATTACK_PAIRS);
    }

    #[test]
    fn test_threat_packing() {
        let t = Threat::new(Color::Black, Piece::Queen, sq("d8"), Color::White, sq("h4"));
        assert_eq!(t.color(), Color::Black);
        assert_eq!(t.piece(), Piece::Queen);
        assert_eq!((t.from(), t.to()), (sq("d8"), sq("h4")));
        assert_eq!(t.victim(), Color::White);
        assert_eq!(format!("{t:?}"), "qd8xh4");
    }

    #[test]
    fn test_start_position_threats_are_all_defences() {
        let list = threats(&Board::new());
        // Per side: knights 2, bishops 4, rooks 4, queen 5, king 5
        assert_eq!(list.len(), 40);
        assert!(list.iter().all(|t| t.color() == t.victim()));
    }

    #[test]
    fn test_indices_unique_and_in_range() {
        let board = Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let list = threats(&board);
        for perspective in Color::BOTH {
            let king_sq = board.king_square(perspective);
            let indices: HashSet<usize> = list
                .iter()
                .map(|&t| threat_index(perspective, king_sq, t))
                .collect();
            assert_eq!(indices.len(), list.len());
            assert!(indices.iter().all(|&i| (FEATURE_COUNT..THREAT_INPUTS).contains(&i)));
        }
    }

    #[test]
    fn test_index_follows_color_flip() {
        let t = Threat::new(Color::White, Piece::Pawn, sq("e4"), Color::Black, sq("d5"));
        let flipped = Threat::new(Color::Black, Piece::Pawn, sq("e5"), Color::White, sq("d4"));
        assert_eq!(
            threat_index(Color::White, sq("g1"), t),
            threat_index(Color::Black, sq("g8"), flipped)
        );
        // Same attacker, friendly target: the other half of the threat block
        let defence = Threat::new(Color::White, Piece::Pawn, sq("e4"), Color::White, sq("d5"));
        assert_eq!(
            threat_index(Color::White, sq("g1"), t),
            threat_index(Color::White, sq("g1"), defence) + ATTACK_PAIRS
        );
    }

    #[test]
    fn test_dirty_threats_of_pawn_push() {
        let mut board = Board::new();
        let before = threats(&board);
        let mv = board.parse_move("e2e4").unwrap();
        board.make_move(mv);
        let after = threats(&board);

        let mut dirty = DirtyThreats::default();
        dirty.diff(&before, &after);
        // Knight, bishop, queen and king no longer guard e2
        assert_eq!(dirty.removed.len(), 4);
        assert!(dirty.removed.iter().all(|t| t.to() == sq("e2")));
        assert!(dirty.added.is_empty());

        let mut replayed: Vec<Threat> = before
            .into_iter()
            .filter(|t| !dirty.removed.contains(t))
            .chain(dirty.added.iter().copied())
            .collect();
        replayed.sort_unstable();
        assert_eq!(replayed, after);
    }

    #[test]
    fn test_slider_discovery_shows_in_diff() {
        // Moving the knight opens the rook's file onto the black rook
        let mut board = Board::from_fen("3rk3/8/8/8/8/8/3N4/3RK3 w - - 0 1");
        let before = threats(&board);
        let mv = board.parse_move("d2f3").unwrap();
        board.make_move(mv);
        let mut dirty = DirtyThreats::default();
        dirty.diff(&before, &threats(&board));
        let opened = Threat::new(Color::White, Piece::Rook, sq("d1"), Color::Black, sq("d8"));
        let answered = Threat::new(Color::Black, Piece::Rook, sq("d8"), Color::White, sq("d1"));
        assert!(dirty.added.contains(&opened));
        assert!(dirty.added.contains(&answered));
        assert!(!dirty.is_empty());
    }
}
