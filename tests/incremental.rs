//! Incrementally maintained accumulators must match a full refresh.

use once_cell::sync::Lazy;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use nnue_eval::board::{Board, Color, Move, UnmakeInfo};
use nnue_eval::nnue::{Accumulator, FeatureTransformer, Networks, NnueState};

/// Networks shared by the property cases, built once
static SHARED_NETS: Lazy<Vec<Networks>> = Lazy::new(|| (0..4).map(Networks::synthetic).collect());

fn refreshed<const W: usize, const B: usize, const T: bool>(
    ft: &FeatureTransformer<W, B, T>,
    board: &Board,
) -> Accumulator<W, B> {
    let mut acc = Accumulator::new();
    for perspective in Color::BOTH {
        ft.refresh(board, perspective, &mut acc);
    }
    acc
}

fn assert_matches_refresh(state: &mut NnueState, nets: &Networks, board: &Board) {
    let fen = board.to_fen();
    let big = refreshed(&nets.big.transformer, board);
    assert_eq!(state.big_accumulator(nets, board), &big, "big network at {fen}");
    let small = refreshed(&nets.small.transformer, board);
    assert_eq!(state.small_accumulator(nets, board), &small, "small network at {fen}");
}

#[test]
fn pawn_push_update_matches_refresh() {
    let nets = Networks::synthetic(17);
    let mut board = Board::new();
    let mut state = NnueState::new(&nets, &board);
    let mv = board.parse_move("e2e4").unwrap();
    state.make_move(&mut board, mv);
    assert_matches_refresh(&mut state, &nets, &board);
}

#[test]
fn scripted_game_with_every_dirty_shape() {
    // En passant, castling, captures, a capturing promotion and king walks
    let moves = [
        "e2e4", "d7d5", "e4e5", "f7f5", "e5f6", "g8f6", "g1f3", "e7e6", "f1d3", "f8d6", "e1g1",
        "e8g8", "b2b4", "b8c6", "b4b5", "c8d7", "b5c6", "d8e7", "c6b7", "a7a6", "b7a8q", "f8a8",
        "g1h1", "g8h8",
    ];
    let nets = Networks::synthetic(23);
    let mut board = Board::new();
    let mut state = NnueState::new(&nets, &board);
    let mut history: Vec<UnmakeInfo> = Vec::new();

    for uci in moves {
        let mv = board.parse_move(uci).unwrap();
        history.push(state.make_move(&mut board, mv));
        assert_matches_refresh(&mut state, &nets, &board);
    }

    // Unwinding revisits accumulators that are still valid
    while let Some(info) = history.pop() {
        state.unmake_move(&mut board, &info);
        assert_matches_refresh(&mut state, &nets, &board);
    }
    assert_eq!(board.to_fen(), Board::new().to_fen());
}

#[test]
fn lazy_catch_up_across_king_moves() {
    let nets = Networks::synthetic(29);
    let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
    let mut state = NnueState::new(&nets, &board);
    // Nothing is scored until the end; both kings moved along the way
    for uci in ["e1d1", "e8f8", "a1a7", "h8h2", "d1e1", "f8g8"] {
        let mv = board.parse_move(uci).unwrap();
        state.make_move(&mut board, mv);
    }
    assert_matches_refresh(&mut state, &nets, &board);
}

#[test]
fn slider_lines_opening_and_closing_match_refresh() {
    // Queens, rooks and bishops keep uncovering and blocking each other
    let moves = [
        "c3d5", "f6d5", "e4d5", "c6b4", "d5d6", "e7d6", "e1g1", "b4c2", "d1c2", "d6h2", "f3h2",
        "d8h4",
    ];
    let nets = Networks::synthetic(31);
    let mut board =
        Board::from_fen("r1bqk2r/ppppbppp/2n2n2/8/4P3/2N2N2/PPPPBPPP/R1BQK2R w KQkq - 0 1");
    let mut state = NnueState::new(&nets, &board);
    for uci in moves {
        let mv = board.parse_legal_move(uci).unwrap();
        state.make_move(&mut board, mv);
        assert_matches_refresh(&mut state, &nets, &board);
    }
}

fn random_game(seed: u64, plies: usize, nets: &Networks, score_every: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut board = Board::new();
    let mut state = NnueState::new(nets, &board);
    let mut history: Vec<(Move, UnmakeInfo)> = Vec::new();

    for ply in 0..plies {
        let moves = board.legal_moves();
        let Some(&mv) = moves.choose(&mut rng) else {
            break;
        };
        history.push((mv, state.make_move(&mut board, mv)));
        if ply % score_every == 0 {
            assert_matches_refresh(&mut state, nets, &board);
        }
        // Occasionally step back and try another branch
        if rng.gen_bool(0.1) {
            if let Some((_, info)) = history.pop() {
                state.unmake_move(&mut board, &info);
            }
        }
    }
    assert_matches_refresh(&mut state, nets, &board);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_random_games_match_refresh(seed in any::<u64>(), plies in 1..80usize, score_every in 1..6usize) {
        random_game(seed, plies, &SHARED_NETS[(seed % 4) as usize], score_every);
    }
}
