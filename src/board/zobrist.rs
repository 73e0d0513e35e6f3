//! Zobrist hashing for chess positions.

use once_cell::sync::Lazy;
use rand::prelude::*;

pub(crate) struct ZobristKeys {
    /// `piece_keys[piece][color][square]`
    pub(crate) piece_keys: [[[u64; 64]; 2]; 6],
    pub(crate) black_to_move_key: u64,
    /// Indexed by the 4-bit castling-rights mask
    pub(crate) castling_keys: [u64; 16],
    /// Indexed by the en passant file
    pub(crate) en_passant_keys: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(1_234_567_890);
        let mut piece_keys = [[[0; 64]; 2]; 6];
        for key in piece_keys.iter_mut().flatten().flatten() {
            *key = rng.gen();
        }
        let black_to_move_key = rng.gen();
        let mut castling_keys = [0; 16];
        for key in &mut castling_keys {
            *key = rng.gen();
        }
        let mut en_passant_keys = [0; 8];
        for key in &mut en_passant_keys {
            *key = rng.gen();
        }

        ZobristKeys {
            piece_keys,
            black_to_move_key,
            castling_keys,
            en_passant_keys,
        }
    }
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);
