//! Layers behind the feature transformer.
//!
//! - `AffineTransform`: quantized dense layer (u8 inputs, i8 weights, i32 out)
//! - `LayerStack`: the big network's fc_0 -> activation -> fc_1 ->
//!   activation -> fc_2 pipeline, one per piece-count bucket
//! - `CompactHead`: the small network's fused squared-clipped-ReLU output

use std::io::{self, Read, Write};

use super::io::{read_i16, read_i16_vec, read_i32_vec, read_i8_vec, write_i16_slice, write_i32_slice, write_i8_slice};
use super::simd;

/// Fixed-point scale of network outputs
pub const OUTPUT_SCALE: i32 = 16;

/// Fractional bits of the affine weights
pub const WEIGHT_SCALE_BITS: u32 = 6;

/// Padded input dimension for vector loads
#[must_use]
pub const fn padded(dims: usize) -> usize {
    dims.div_ceil(simd::LANE_MULTIPLE) * simd::LANE_MULTIPLE
}

/// Quantized dense layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AffineTransform<const IN: usize, const OUT: usize> {
    pub(crate) biases: Vec<i32>,
    /// Row-major `[OUT][padded(IN)]`, padding columns zero
    pub(crate) weights: Vec<i8>,
}

impl<const IN: usize, const OUT: usize> AffineTransform<IN, OUT> {
    pub const PADDED_IN: usize = padded(IN);

    #[must_use]
    pub const fn hash(prev: u32) -> u32 {
        let mut hash = 0xCC03_DAE4u32.wrapping_add(OUT as u32);
        hash ^= prev >> 1;
        hash ^= prev << 31;
        hash
    }

    #[must_use]
    pub fn new(biases: Vec<i32>, weights: Vec<i8>) -> Self {
        assert_eq!(biases.len(), OUT);
        assert_eq!(weights.len(), OUT * Self::PADDED_IN);
        AffineTransform { biases, weights }
    }

    #[inline]
    fn row(&self, out: usize) -> &[i8] {
        &self.weights[out * Self::PADDED_IN..(out + 1) * Self::PADDED_IN]
    }

    /// `output = biases + W·input`, wrapping on i32 overflow; `input` holds
    /// `padded(IN)` bytes.
    #[inline]
    pub fn propagate(&self, input: &[u8], output: &mut [i32]) {
        let input = &input[..Self::PADDED_IN];
        for (o, out) in output.iter_mut().enumerate().take(OUT) {
            *out = self.biases[o].wrapping_add(simd::dot_u8_i8(input, self.row(o)));
        }
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let biases = read_i32_vec(reader, OUT)?;
        let weights = read_i8_vec(reader, OUT * Self::PADDED_IN)?;
        Ok(AffineTransform { biases, weights })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_i32_slice(writer, &self.biases)?;
        write_i8_slice(writer, &self.weights)
    }
}

/// Structural hash contribution of the clipped activation
#[must_use]
pub const fn activation_hash(prev: u32) -> u32 {
    0x538D_24C7u32.wrapping_add(prev)
}

/// Transformed-feature width feeding a layer stack (both perspectives)
pub const STACK_INPUT: usize = 512;
/// fc_0 outputs; the last one bypasses the hidden layers
pub const FC_0_OUTPUTS: usize = 15;
pub const FC_1_OUTPUTS: usize = 32;

/// One of the big network's output subnetworks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerStack {
    pub(crate) fc_0: AffineTransform<STACK_INPUT, { FC_0_OUTPUTS + 1 }>,
    pub(crate) fc_1: AffineTransform<FC_0_OUTPUTS, FC_1_OUTPUTS>,
    pub(crate) fc_2: AffineTransform<FC_1_OUTPUTS, 1>,
}

impl LayerStack {
    /// Structural hash of a stack, written ahead of each stack's parameters
    pub const HASH: u32 = {
        let hash = 0xEC42_E90Du32 ^ (STACK_INPUT as u32);
        let hash = AffineTransform::<STACK_INPUT, { FC_0_OUTPUTS + 1 }>::hash(hash);
        let hash = activation_hash(hash);
        let hash = AffineTransform::<FC_0_OUTPUTS, FC_1_OUTPUTS>::hash(hash);
        let hash = activation_hash(hash);
        AffineTransform::<FC_1_OUTPUTS, 1>::hash(hash)
    };

    /// Positional output in `OUTPUT_SCALE` units, bypass path included.
    #[must_use]
    pub fn propagate(&self, transformed: &[u8; STACK_INPUT]) -> i32 {
        let mut fc_0_out = [0i32; FC_0_OUTPUTS + 1];
        self.fc_0.propagate(transformed, &mut fc_0_out);

        // Activation runs on all 16 lanes; the bypass lane and the tail are zeroed
        let mut ac_0_out = [0u8; padded(FC_0_OUTPUTS)];
        simd::activate(&fc_0_out, &mut ac_0_out[..FC_0_OUTPUTS + 1]);
        ac_0_out[FC_0_OUTPUTS..].fill(0);

        let mut fc_1_out = [0i32; FC_1_OUTPUTS];
        self.fc_1.propagate(&ac_0_out, &mut fc_1_out);
        let mut ac_1_out = [0u8; FC_1_OUTPUTS];
        simd::activate(&fc_1_out, &mut ac_1_out);

        let mut fc_2_out = [0i32; 1];
        self.fc_2.propagate(&ac_1_out, &mut fc_2_out);

        let bypass = i64::from(fc_0_out[FC_0_OUTPUTS]) * i64::from(600 * OUTPUT_SCALE)
            / i64::from(127 * (1 << WEIGHT_SCALE_BITS));
        fc_2_out[0].saturating_add(bypass.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(LayerStack {
            fc_0: AffineTransform::read(reader)?,
            fc_1: AffineTransform::read(reader)?,
            fc_2: AffineTransform::read(reader)?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.fc_0.write(writer)?;
        self.fc_1.write(writer)?;
        self.fc_2.write(writer)
    }
}

/// Accumulator clamp of the compact head
pub const QA: i16 = 101;
/// Output weight quantization of the compact head
pub const QB: i32 = 160;
/// Centipawn-ish scale of the compact head
pub const SCALE: i32 = 340;

/// Small network output: squared clipped ReLU fused with a dense layer
/// over both accumulator halves, side to move first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactHead<const W: usize> {
    /// `[side to move | other side]`, `2·W` entries
    pub(crate) weights: Vec<i16>,
    pub(crate) bias: i16,
}

impl<const W: usize> CompactHead<W> {
    pub const HASH: u32 = 0x3C10_3E72 ^ (2 * W as u32);

    #[must_use]
    pub fn new(weights: Vec<i16>, bias: i16) -> Self {
        assert_eq!(weights.len(), 2 * W);
        CompactHead { weights, bias }
    }

    /// Rescale the raw dot product into `OUTPUT_SCALE` units.
    fn rescale(&self, sum: i32) -> i32 {
        let qa = i64::from(QA);
        let unsquared = i64::from(sum) / qa + i64::from(self.bias);
        let value = unsquared * i64::from(SCALE) / (qa * i64::from(QB));
        (value * i64::from(OUTPUT_SCALE)) as i32
    }

    /// Positional output from the two accumulator halves.
    #[must_use]
    pub fn propagate(&self, us: &[i16; W], them: &[i16; W]) -> i32 {
        let sum = simd::screlu_dot(us, &self.weights[..W], QA)
            .wrapping_add(simd::screlu_dot(them, &self.weights[W..], QA));
        self.rescale(sum)
    }

    /// Same result as `propagate`, computed as an explicit activation vector
    /// followed by a dense layer. Agrees with `propagate` as long as every
    /// `clamp · weight` fits in 16 bits.
    #[must_use]
    pub fn propagate_unfused(&self, us: &[i16; W], them: &[i16; W]) -> i32 {
        let activated: Vec<i32> = us
            .iter()
            .chain(them.iter())
            .map(|&a| {
                let c = i32::from(a.clamp(0, QA));
                c * c
            })
            .collect();
        let sum = activated
            .iter()
            .zip(&self.weights)
            .fold(0i32, |acc, (&a, &w)| acc.wrapping_add(a * i32::from(w)));
        self.rescale(sum)
    }

    pub fn read<R: Read>(reader: &mut R) -> io::Result<Self> {
        let weights = read_i16_vec(reader, 2 * W)?;
        let bias = read_i16(reader)?;
        Ok(CompactHead { weights, bias })
    }

    pub fn write<Wr: Write>(&self, writer: &mut Wr) -> io::Result<()> {
        write_i16_slice(writer, &self.weights)?;
        write_i16_slice(writer, &[self.bias])
    }
}
