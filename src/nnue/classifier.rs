//! Auxiliary classifier deciding whether a small network score should be
//! re-checked with the big network.
//!
//! `inputs -> h1 (ReLU) -> h2 (ReLU) -> 1 (sigmoid)`, plain f32.

use std::io::{self, Read, Write};

use rand::prelude::*;

use super::error::NnueError;
use super::io::{expect_eof, read_f32_vec, read_u32, write_f32_slice, write_u32};

/// File magic, `b"AUXC"` read as a little-endian word
pub const MAGIC: [u8; 4] = *b"AUXC";

/// Length of the classifier feature vector
pub const CLASSIFIER_INPUTS: usize = 10;

/// Largest hidden layer accepted from a file
const MAX_HIDDEN: usize = 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct Classifier {
    h1: usize,
    h2: usize,
    /// `[h1][CLASSIFIER_INPUTS]`
    w1: Vec<f32>,
    b1: Vec<f32>,
    /// `[h2][h1]`
    w2: Vec<f32>,
    b2: Vec<f32>,
    w3: Vec<f32>,
    b3: f32,
}

fn dense_relu(input: &[f32], weights: &[f32], biases: &[f32], out: &mut Vec<f32>) {
    out.clear();
    out.extend(biases.iter().zip(weights.chunks_exact(input.len())).map(|(&b, row)| {
        let sum: f32 = row.iter().zip(input).map(|(w, x)| w * x).sum();
        (sum + b).max(0.0)
    }));
}

impl Classifier {
    /// # Panics
    ///
    /// Panics if the parameter lengths disagree with the layer sizes.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        h1: usize,
        h2: usize,
        w1: Vec<f32>,
        b1: Vec<f32>,
        w2: Vec<f32>,
        b2: Vec<f32>,
        w3: Vec<f32>,
        b3: f32,
    ) -> Self {
        assert_eq!(w1.len(), h1 * CLASSIFIER_INPUTS);
        assert_eq!(b1.len(), h1);
        assert_eq!(w2.len(), h2 * h1);
        assert_eq!(b2.len(), h2);
        assert_eq!(w3.len(), h2);
        Classifier {
            h1,
            h2,
            w1,
            b1,
            w2,
            b2,
            w3,
            b3,
        }
    }

    /// A classifier that ignores its input and always answers `p`.
    #[must_use]
    pub fn constant(p: f32) -> Self {
        let logit = (p / (1.0 - p)).ln();
        Classifier::new(
            1,
            1,
            vec![0.0; CLASSIFIER_INPUTS],
            vec![0.0],
            vec![0.0],
            vec![0.0],
            vec![0.0],
            logit,
        )
    }

    /// Deterministic pseudo-random classifier, for tests and benchmarks.
    #[must_use]
    pub fn synthetic(seed: u64, h1: usize, h2: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = |n: usize| -> Vec<f32> { (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect() };
        let w1 = values(h1 * CLASSIFIER_INPUTS);
        let b1 = values(h1);
        let w2 = values(h2 * h1);
        let b2 = values(h2);
        let w3 = values(h2);
        let b3 = values(1)[0];
        Classifier::new(h1, h2, w1, b1, w2, b2, w3, b3)
    }

    /// Probability that the big network should be consulted.
    #[must_use]
    pub fn forward(&self, features: &[f32; CLASSIFIER_INPUTS]) -> f32 {
        let mut hidden_1 = Vec::with_capacity(self.h1);
        dense_relu(features, &self.w1, &self.b1, &mut hidden_1);
        let mut hidden_2 = Vec::with_capacity(self.h2);
        dense_relu(&hidden_1, &self.w2, &self.b2, &mut hidden_2);

        let logit: f32 = self.w3.iter().zip(&hidden_2).map(|(w, x)| w * x).sum::<f32>() + self.b3;
        1.0 / (1.0 + (-logit).exp())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self, NnueError> {
        let magic = read_u32(reader)?.to_le_bytes();
        if magic != MAGIC {
            return Err(NnueError::BadMagic { found: magic });
        }
        let inputs = read_u32(reader)? as usize;
        let h1 = read_u32(reader)? as usize;
        let h2 = read_u32(reader)? as usize;
        if inputs != CLASSIFIER_INPUTS || h1 == 0 || h2 == 0 || h1 > MAX_HIDDEN || h2 > MAX_HIDDEN {
            return Err(NnueError::BadDimensions(format!(
                "classifier {inputs} -> {h1} -> {h2} -> 1"
            )));
        }

        let w1 = read_f32_vec(reader, h1 * CLASSIFIER_INPUTS)?;
        let b1 = read_f32_vec(reader, h1)?;
        let w2 = read_f32_vec(reader, h2 * h1)?;
        let b2 = read_f32_vec(reader, h2)?;
        let w3 = read_f32_vec(reader, h2)?;
        let b3 = read_f32_vec(reader, 1)?[0];
        expect_eof(reader)?;
        Ok(Classifier::new(h1, h2, w1, b1, w2, b2, w3, b3))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u32(writer, u32::from_le_bytes(MAGIC))?;
        write_u32(writer, CLASSIFIER_INPUTS as u32)?;
        write_u32(writer, self.h1 as u32)?;
        write_u32(writer, self.h2 as u32)?;
        write_f32_slice(writer, &self.w1)?;
        write_f32_slice(writer, &self.b1)?;
        write_f32_slice(writer, &self.w2)?;
        write_f32_slice(writer, &self.b2)?;
        write_f32_slice(writer, &self.w3)?;
        write_f32_slice(writer, &[self.b3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_constant_classifier() {
        let features = [0.3; CLASSIFIER_INPUTS];
        assert!((Classifier::constant(0.9).forward(&features) - 0.9).abs() < 1e-5);
        assert!(Classifier::constant(0.1).forward(&features) < 0.5);
    }

    #[test]
    fn test_forward_by_hand() {
        // One unit per layer reading only the first input
        let mut w1 = vec![0.0; CLASSIFIER_INPUTS];
        w1[0] = 2.0;
        let c = Classifier::new(1, 1, w1, vec![-1.0], vec![1.0], vec![0.0], vec![1.0], 0.0);

        let mut x = [0.0; CLASSIFIER_INPUTS];
        // Hidden activations clamp at zero -> logit 0
        assert!((c.forward(&x) - 0.5).abs() < 1e-6);
        x[0] = 1.0;
        let expected = 1.0 / (1.0 + (-1.0f32).exp());
        assert!((c.forward(&x) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_write_read_and_rejects() {
        let c = Classifier::synthetic(4, 16, 8);
        let mut bytes = Vec::new();
        c.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[..4], b"AUXC");
        assert_eq!(Classifier::read(&mut Cursor::new(&bytes)).unwrap(), c);

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            Classifier::read(&mut Cursor::new(&bad_magic)),
            Err(NnueError::BadMagic { .. })
        ));

        let mut bad_inputs = bytes.clone();
        bad_inputs[4] = 11;
        assert!(matches!(
            Classifier::read(&mut Cursor::new(&bad_inputs)),
            Err(NnueError::BadDimensions(_))
        ));

        assert!(Classifier::read(&mut Cursor::new(&bytes[..bytes.len() - 1]))
            .unwrap_err()
            .is_io());
    }
}
