//! Benchmarks for accumulator maintenance and network inference.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use nnue_eval::board::{Board, Color};
use nnue_eval::evaluate::evaluate;
use nnue_eval::nnue::{simd, BigAccumulator, Networks, NnueState, SmallAccumulator};

const POSITIONS: [(&str, &str); 3] = [
    ("startpos", "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
    ("kiwipete", "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"),
    ("endgame", "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1"),
];

fn bench_refresh(c: &mut Criterion) {
    let nets = Networks::synthetic(1);
    let mut group = c.benchmark_group("refresh");

    for (name, fen) in POSITIONS {
        let board = Board::from_fen(fen);
        group.bench_with_input(BenchmarkId::new("big", name), &board, |b, board| {
            let mut acc = BigAccumulator::new();
            b.iter(|| {
                for perspective in Color::BOTH {
                    nets.big.transformer.refresh(black_box(board), perspective, &mut acc);
                }
            })
        });
        group.bench_with_input(BenchmarkId::new("small", name), &board, |b, board| {
            let mut acc = SmallAccumulator::new();
            b.iter(|| {
                for perspective in Color::BOTH {
                    nets.small.transformer.refresh(black_box(board), perspective, &mut acc);
                }
            })
        });
    }

    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let nets = Networks::synthetic(1);
    let mut board = Board::from_fen(POSITIONS[1].1);
    let mut state = NnueState::new(&nets, &board);
    let moves = board.legal_moves();

    c.bench_function("make_update_unmake", |b| {
        b.iter(|| {
            for &mv in &moves {
                let info = state.make_move(&mut board, mv);
                black_box(state.big_accumulator(&nets, &board));
                state.unmake_move(&mut board, &info);
            }
        })
    });
}

fn bench_inference(c: &mut Criterion) {
    let nets = Networks::synthetic(1);
    let board = Board::from_fen(POSITIONS[1].1);
    let mut big = BigAccumulator::new();
    let mut small = SmallAccumulator::new();
    for perspective in Color::BOTH {
        nets.big.transformer.refresh(&board, perspective, &mut big);
        nets.small.transformer.refresh(&board, perspective, &mut small);
    }

    let mut group = c.benchmark_group(format!("inference ({})", simd::backend_name()));
    group.bench_function("big", |b| {
        b.iter(|| nets.big.evaluate(black_box(&big), Color::White, board.piece_count()))
    });
    group.bench_function("small", |b| {
        b.iter(|| nets.small.evaluate(black_box(&small), Color::White))
    });
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let nets = Networks::synthetic(1);
    let mut group = c.benchmark_group("evaluate");

    for (name, fen) in POSITIONS {
        let board = Board::from_fen(fen);
        let mut state = NnueState::new(&nets, &board);
        group.bench_function(name, |b| {
            b.iter(|| {
                // Cold caches: every iteration recomputes from scratch
                state.reset(&nets, &board);
                evaluate(black_box(&board), &nets, &mut state, 0)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_refresh, bench_incremental, bench_inference, bench_evaluate);
criterion_main!(benches);
