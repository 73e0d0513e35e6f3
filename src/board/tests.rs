use super::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn sq(name: &str) -> Square {
    name.parse().unwrap()
}

fn play(board: &mut Board, uci: &str) -> UnmakeInfo {
    let mv = board.parse_move(uci).unwrap();
    board.make_move(mv)
}

#[test]
fn test_fen_round_trip() {
    let fens = [
        START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 b - - 12 40",
    ];
    for fen in fens {
        assert_eq!(Board::from_fen(fen).to_fen(), fen);
    }
}

#[test]
fn test_fen_errors() {
    assert!(matches!(
        Board::try_from_fen("8/8/8 w"),
        Err(FenError::TooFewParts { found: 2 })
    ));
    assert!(matches!(
        Board::try_from_fen("rnbqkbnr/ppppxppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
        Err(FenError::InvalidPiece { char: 'x' })
    ));
    assert!(matches!(
        Board::try_from_fen("8/8/8/8/8/8/8/K7 w - - 0 1"),
        Err(FenError::KingCount { found: 0, .. })
    ));
    assert!(matches!(
        Board::try_from_fen("k7/8/8/8/8/8/8/K7 x - - 0 1"),
        Err(FenError::InvalidSideToMove { .. })
    ));
    assert!(matches!(
        Board::try_from_fen("k7/8/8/8/8/8/8/K7 w - z9 0 1"),
        Err(FenError::InvalidEnPassant { .. })
    ));
    assert!("k7/8/8/8/8/8/8/K8 w - - 0 1".parse::<Board>().is_err());
}

#[test]
fn test_start_position_queries() {
    let board = Board::new();
    assert_eq!(board.piece_count(), 32);
    assert_eq!(board.king_square(Color::White), sq("e1"));
    assert_eq!(board.king_square(Color::Black), sq("e8"));
    assert_eq!(board.non_pawn_material(Color::White), 2 * 854 + 2 * 915 + 2 * 1380 + 2682);
    assert_eq!(board.simple_eval(Color::White), 0);
    assert_eq!(board.classical_eval(), 0);
    assert!(!board.in_check());
    assert_eq!(board.piece_at(sq("d8")), Some((Color::Black, Piece::Queen)));
    assert_eq!(board.piece_at(sq("e4")), None);
}

#[test]
fn test_simple_eval_queen_odds() {
    let board = Board::from_fen("rnb1kbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
    assert_eq!(board.simple_eval(Color::White), 2682);
    assert_eq!(board.simple_eval(Color::Black), -2682);
}

#[test]
fn test_checkers() {
    let board = Board::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1");
    assert_eq!(board.checkers().popcount(), 1);
    assert!(board.checkers().contains(sq("e2")));

    let board = Board::from_fen("4k3/8/8/8/8/3n4/8/4K2r w - - 0 1");
    assert_eq!(board.checkers().popcount(), 2);

    let board = Board::from_fen("4k3/8/8/8/8/8/3P4/4K3 b - - 0 1");
    assert!(!board.in_check());
}

#[test]
fn test_parse_move_infers_flags() {
    let board = Board::from_fen("r3k2r/8/8/3pP3/8/8/6p1/R3K2R w KQkq d6 0 1");
    assert!(board.parse_move("e1g1").unwrap().is_castling());
    assert!(board.parse_move("e1c1").unwrap().is_castling());
    assert!(board.parse_move("e5d6").unwrap().is_en_passant());
    assert!(board.parse_move("a1a8").unwrap().is_capture());
    assert!(!board.parse_move("e1f1").unwrap().is_capture());
    assert!(matches!(
        board.parse_move("e2e4"),
        Err(MoveParseError::EmptyOrigin { .. })
    ));
    assert!(matches!(
        board.parse_move("e5e6k"),
        Err(MoveParseError::InvalidPromotion { char: 'k' })
    ));
    assert!(matches!(
        board.parse_move("e9e4"),
        Err(MoveParseError::InvalidSquare { .. })
    ));
    assert!(matches!(
        board.parse_move("e2"),
        Err(MoveParseError::InvalidLength { len: 2 })
    ));
}

#[test]
fn test_dirty_piece_shapes() {
    let mut board = Board::from_fen("r3k2r/1P6/8/3pP3/8/8/8/R3K2R w KQkq d6 0 1");

    let info = play(&mut board, "e5d6");
    match info.dirty {
        DirtyPiece::Capture { to, captured, .. } => {
            assert_eq!(to.square, sq("d6"));
            assert_eq!(captured.square, sq("d5"));
            assert_eq!(captured.piece, Piece::Pawn);
        }
        other => panic!("expected en passant capture, got {other:?}"),
    }
    board.unmake_move(&info);

    let info = play(&mut board, "e1g1");
    match info.dirty {
        DirtyPiece::Castling {
            king_to, rook_from, rook_to, ..
        } => {
            assert_eq!(king_to.square, sq("g1"));
            assert_eq!(rook_from.square, sq("h1"));
            assert_eq!(rook_to.square, sq("f1"));
        }
        other => panic!("expected castling, got {other:?}"),
    }
    assert!(info.dirty.moves_king(Color::White));
    board.unmake_move(&info);

    let info = play(&mut board, "b7a8q");
    match info.dirty {
        DirtyPiece::Capture { from, to, captured } => {
            assert_eq!(from.piece, Piece::Pawn);
            assert_eq!(to.piece, Piece::Queen);
            assert_eq!(captured.piece, Piece::Rook);
        }
        other => panic!("expected capture promotion, got {other:?}"),
    }
    board.unmake_move(&info);

    let info = play(&mut board, "a1a2");
    assert!(matches!(info.dirty, DirtyPiece::Normal { .. }));
}

#[test]
fn test_castling_rights_updates() {
    let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
    play(&mut board, "a1a8");
    assert_eq!(board.to_fen(), "R3k2r/8/8/8/8/8/8/4K2R b Kk - 0 1");
    play(&mut board, "e8g8");
    assert_eq!(board.to_fen(), "R4rk1/8/8/8/8/8/8/4K2R w K - 1 2");
    assert_eq!(board.hash(), board.calculate_hash());
}

#[test]
fn test_unmake_rook_capture_restores_rights_and_clock() {
    let fen = "r3k2r/8/8/8/8/8/6b1/R3K2R b KQkq - 7 30";
    let mut board = Board::from_fen(fen);
    let info = play(&mut board, "g2h1");
    assert_eq!(board.to_fen(), "r3k2r/8/8/8/8/8/8/R3K2b w Qkq - 0 31");
    assert!(matches!(
        info.dirty,
        DirtyPiece::Capture { captured, .. } if captured.piece == Piece::Rook && captured.color == Color::White
    ));
    board.unmake_move(&info);
    assert_eq!(board.to_fen(), fen);
    assert_eq!(board.hash(), board.calculate_hash());
}

#[test]
fn test_mirror_and_color_flip() {
    let board = Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
    let mirrored = board.mirrored();
    assert_eq!(mirrored.king_square(Color::White), sq("d1"));
    assert_eq!(mirrored.mirrored().pieces(Color::Black, Piece::Knight), board.pieces(Color::Black, Piece::Knight));

    let flipped = board.color_flipped();
    assert_eq!(flipped.side_to_move(), Color::Black);
    assert_eq!(flipped.king_square(Color::Black), sq("e8"));
    assert_eq!(flipped.simple_eval(Color::Black), board.simple_eval(Color::White));
    assert_eq!(flipped.classical_eval(), board.classical_eval());
    assert_eq!(flipped.color_flipped().to_fen(), board.to_fen());
}

proptest! {
    /// make_move followed by unmake_move restores the board exactly
    #[test]
    fn prop_make_unmake_restores_state(seed in any::<u64>(), num_moves in 1..=40usize) {
        let mut board = Board::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let initial_fen = board.to_fen();
        let initial_hash = board.hash();

        let mut history = Vec::new();
        for _ in 0..num_moves {
            let moves = board.legal_moves();
            let Some(&mv) = moves.choose(&mut rng) else { break };
            history.push(board.make_move(mv));
            prop_assert_eq!(board.hash(), board.calculate_hash());
        }
        while let Some(info) = history.pop() {
            board.unmake_move(&info);
        }

        prop_assert_eq!(board.hash(), initial_hash);
        prop_assert_eq!(board.to_fen(), initial_fen);
    }
}
