//! Quantization overrides for the compact 8-bit network format.
//!
//! The compact format stores first-layer weights as bytes. A handful of byte
//! codes per (piece type, point of view) stand for calibrated 16-bit values
//! that do not fit in a byte; every other code is the weight itself. The
//! table is calibration data tied to the shipped network and is treated as
//! opaque.

use once_cell::sync::Lazy;

/// `(piece type, pov, code index, value)`; `code index = byte as i8 + 128`
#[rustfmt::skip]
const OVERRIDES: &[(usize, usize, usize, i16)] = &[
    (0, 0, 0, -200), (0, 0, 1, -196), (0, 0, 2, -148), (0, 0, 3, -142),
    (0, 1, 0, -191), (0, 1, 1, -175), (0, 1, 3, -171), (0, 1, 4, -164), (0, 1, 5, -163),
    (0, 1, 6, -160), (0, 1, 7, -157), (0, 1, 8, -141), (0, 1, 9, -139),
    (1, 0, 0, -131),
    (2, 0, 0, -142), (2, 0, 1, -136), (2, 0, 2, -135), (2, 0, 3, -129),
    (4, 0, 0, -182), (4, 0, 1, -181), (4, 0, 2, -175), (4, 0, 3, -173), (4, 0, 4, -172),
    (4, 0, 5, -170), (4, 0, 6, -167), (4, 0, 7, -166), (4, 0, 8, -165), (4, 0, 9, -164),
    (4, 0, 10, -163), (4, 0, 11, -162), (4, 0, 12, -161), (4, 0, 13, -160), (4, 0, 14, -159),
    (4, 0, 15, -158), (4, 0, 16, -157), (4, 0, 17, -156), (4, 0, 18, -155), (4, 0, 19, -154),
    (4, 0, 20, -153), (4, 0, 21, -152), (4, 0, 22, -151), (4, 0, 23, -150), (4, 0, 24, -149),
    (4, 0, 25, -148), (4, 0, 26, -146), (4, 0, 27, -145), (4, 0, 28, -144), (4, 0, 29, -143),
    (4, 0, 30, -142), (4, 0, 31, -141), (4, 0, 32, -140), (4, 0, 33, -139), (4, 0, 34, -138),
    (4, 1, 0, -155), (4, 1, 1, -154), (4, 1, 2, -144), (4, 1, 3, -139), (4, 1, 16, -138),
    (4, 1, 249, 132), (4, 1, 247, 129), (4, 1, 246, 128),
];

/// `TABLE[piece][pov][code index]`, zero meaning "no override"
static TABLE: Lazy<[[[i16; 256]; 2]; 6]> = Lazy::new(|| {
    let mut table = [[[0i16; 256]; 2]; 6];
    for &(piece, pov, code, value) in OVERRIDES {
        table[piece][pov][code] = value;
    }
    table
});

/// Decode one compact weight byte.
#[inline]
#[must_use]
pub fn decode(piece: usize, pov: usize, byte: i8) -> i16 {
    let code = (i16::from(byte) + 128) as usize;
    match TABLE[piece][pov][code] {
        0 => i16::from(byte),
        value => value,
    }
}

/// Byte that decodes to `value`, if any.
#[must_use]
pub fn encode(piece: usize, pov: usize, value: i16) -> Option<i8> {
    if let Some(&(_, _, code, _)) = OVERRIDES
        .iter()
        .find(|&&(p, v, _, val)| p == piece && v == pov && val == value)
    {
        return Some((code as i16 - 128) as i8);
    }
    let byte = i8::try_from(value).ok()?;
    (decode(piece, pov, byte) == value).then_some(byte)
}
