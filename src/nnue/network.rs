//! Network store: the big and small networks, their file formats, and the
//! immutable bundle shared by all evaluating threads.
//!
//! Big network: (768 + 15008 threats -> 256)x2 -> 8 layer stacks of
//! 512 -> 16 -> 32 -> 1.
//! Small network: (768 -> 64)x2 -> 1 through the compact head.

use std::io::{self, Read, Write};
use std::sync::Arc;

use rand::prelude::*;

use super::accumulator::Accumulator;
use super::classifier::Classifier;
use super::error::{NetSize, NnueError};
use super::features::{FeatureTransformer, FEATURE_COUNT};
use super::io::{
    expect_eof, read_i32_vec, read_i8_vec, read_u32, write_i16_slice, write_i32_slice, write_i8_slice,
    write_u32,
};
use super::layers::{AffineTransform, CompactHead, LayerStack, STACK_INPUT};
use super::remap;
use super::simd;
use crate::board::Color;

/// Version tag of the full network format
pub const VERSION: u32 = 0x7AF3_2F20;
/// Version tag of the compact 8-bit small network format
pub const VERSION_COMPACT: u32 = 0x7AF3_2F21;

pub const BIG_WIDTH: usize = 256;
pub const BIG_PSQT_BUCKETS: usize = 8;
pub const SMALL_WIDTH: usize = 64;
pub const SMALL_PSQT_BUCKETS: usize = 1;
pub const LAYER_STACKS: usize = 8;

/// Size of a headerless compact small network: i8 weights and biases, then
/// the i16 head
pub const HEADERLESS_SIZE: usize =
    FEATURE_COUNT * SMALL_WIDTH + SMALL_WIDTH + 2 * (2 * SMALL_WIDTH) + 2;

/// Longest description accepted in a network header
const MAX_DESCRIPTION: u32 = 1 << 20;

pub type BigAccumulator = Accumulator<BIG_WIDTH, BIG_PSQT_BUCKETS>;
pub type SmallAccumulator = Accumulator<SMALL_WIDTH, SMALL_PSQT_BUCKETS>;
/// Piece-square and threat features
pub type BigTransformer = FeatureTransformer<BIG_WIDTH, BIG_PSQT_BUCKETS, true>;
pub type SmallTransformer = FeatureTransformer<SMALL_WIDTH, SMALL_PSQT_BUCKETS>;

/// Raw network result, both terms in `OUTPUT_SCALE` units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkOutput {
    pub psqt: i32,
    pub positional: i32,
}

fn check_hash(section: &'static str, found: u32, expected: u32) -> Result<(), NnueError> {
    if found == expected {
        Ok(())
    } else {
        Err(NnueError::HashMismatch {
            section,
            found,
            expected,
        })
    }
}

/// Reads the full-format header after the version word, returns the description.
fn read_header<R: Read>(reader: &mut R, file_hash: u32) -> Result<String, NnueError> {
    check_hash("file", read_u32(reader)?, file_hash)?;
    let desc_len = read_u32(reader)?;
    if desc_len > MAX_DESCRIPTION {
        return Err(NnueError::BadDimensions(format!(
            "description of {desc_len} bytes"
        )));
    }
    let mut desc = vec![0u8; desc_len as usize];
    reader.read_exact(&mut desc)?;
    Ok(String::from_utf8_lossy(&desc).into_owned())
}

fn write_header<W: Write>(writer: &mut W, file_hash: u32, description: &str) -> io::Result<()> {
    write_u32(writer, VERSION)?;
    write_u32(writer, file_hash)?;
    write_u32(writer, description.len() as u32)?;
    writer.write_all(description.as_bytes())
}

fn psqt_term<const W: usize, const B: usize>(acc: &Accumulator<W, B>, stm: Color, bucket: usize) -> i32 {
    let us = acc.psqt[stm.index()][bucket];
    let them = acc.psqt[stm.opponent().index()][bucket];
    us.wrapping_sub(them) / 2
}

fn random_transformer<const W: usize, const B: usize, const T: bool>(
    rng: &mut StdRng,
    weight_range: i16,
) -> FeatureTransformer<W, B, T> {
    let inputs = FeatureTransformer::<W, B, T>::INPUTS;
    FeatureTransformer::new(
        (0..W).map(|_| rng.gen_range(-50..=50)).collect(),
        (0..inputs * W)
            .map(|_| rng.gen_range(-weight_range..=weight_range))
            .collect(),
        (0..inputs * B).map(|_| rng.gen_range(-2000..=2000)).collect(),
    )
}

/// Flat position of byte `i` of the compact weight block,
/// `[piece][pov][neuron][square]`, in the transformer's `[feature][neuron]` rows.
fn compact_weight_slot(i: usize) -> (usize, usize, usize) {
    let sq = i % 64;
    let neuron = (i / 64) % SMALL_WIDTH;
    let pov = (i / (64 * SMALL_WIDTH)) % 2;
    let piece = i / (2 * 64 * SMALL_WIDTH);
    let feature = pov * 384 + piece * 64 + sq;
    (feature * SMALL_WIDTH + neuron, piece, pov)
}

fn random_affine<const IN: usize, const OUT: usize>(rng: &mut StdRng) -> AffineTransform<IN, OUT> {
    let mut weights = vec![0i8; OUT * AffineTransform::<IN, OUT>::PADDED_IN];
    for row in weights.chunks_mut(AffineTransform::<IN, OUT>::PADDED_IN) {
        for w in &mut row[..IN] {
            *w = rng.gen_range(-64..=64);
        }
    }
    AffineTransform::new((0..OUT).map(|_| rng.gen_range(-2000..=2000)).collect(), weights)
}

// ============================================================================
// Big network
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BigNetwork {
    pub description: String,
    pub transformer: BigTransformer,
    pub(crate) stacks: Vec<LayerStack>,
}

impl BigNetwork {
    pub const FILE_HASH: u32 = BigTransformer::HASH ^ LayerStack::HASH;

    /// Layer stack used for a position with `piece_count` pieces
    #[inline]
    #[must_use]
    pub fn bucket(piece_count: u32) -> usize {
        (piece_count.saturating_sub(1) as usize / 4).min(LAYER_STACKS - 1)
    }

    /// Deterministic pseudo-random network, for tests and benchmarks.
    #[must_use]
    pub fn synthetic(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let transformer = random_transformer(&mut rng, 40);
        let stacks = (0..LAYER_STACKS)
            .map(|_| LayerStack {
                fc_0: random_affine(&mut rng),
                fc_1: random_affine(&mut rng),
                fc_2: random_affine(&mut rng),
            })
            .collect();
        BigNetwork {
            description: format!("synthetic big network (seed {seed})"),
            transformer,
            stacks,
        }
    }

    /// Score from the side to move's point of view.
    #[must_use]
    pub fn evaluate(&self, acc: &BigAccumulator, stm: Color, piece_count: u32) -> NetworkOutput {
        debug_assert!(acc.is_computed(0) && acc.is_computed(1));
        let bucket = Self::bucket(piece_count);

        let mut transformed = [0u8; STACK_INPUT];
        let (first, second) = transformed.split_at_mut(BIG_WIDTH);
        simd::clamp_to_u8(acc.values(stm.index()), first);
        simd::clamp_to_u8(acc.values(stm.opponent().index()), second);

        NetworkOutput {
            psqt: psqt_term(acc, stm, bucket),
            positional: self.stacks[bucket].propagate(&transformed),
        }
    }

    /// Parse a full-format big network.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, NnueError> {
        let version = read_u32(reader)?;
        if version != VERSION {
            return Err(NnueError::BadVersion {
                found: version,
                expected: VERSION,
            });
        }
        let description = read_header(reader, Self::FILE_HASH)?;
        check_hash("feature transformer", read_u32(reader)?, BigTransformer::HASH)?;
        let transformer = FeatureTransformer::read(reader)?;
        let mut stacks = Vec::with_capacity(LAYER_STACKS);
        for _ in 0..LAYER_STACKS {
            check_hash("layer stack", read_u32(reader)?, LayerStack::HASH)?;
            stacks.push(LayerStack::read(reader)?);
        }
        expect_eof(reader)?;
        Ok(BigNetwork {
            description,
            transformer,
            stacks,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_header(writer, Self::FILE_HASH, &self.description)?;
        write_u32(writer, BigTransformer::HASH)?;
        self.transformer.write(writer)?;
        for stack in &self.stacks {
            write_u32(writer, LayerStack::HASH)?;
            stack.write(writer)?;
        }
        Ok(())
    }
}

// ============================================================================
// Small network
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmallNetwork {
    pub description: String,
    pub transformer: SmallTransformer,
    pub(crate) head: CompactHead<SMALL_WIDTH>,
}

impl SmallNetwork {
    pub const FILE_HASH: u32 = SmallTransformer::HASH ^ CompactHead::<SMALL_WIDTH>::HASH;

    /// Deterministic pseudo-random network, for tests and benchmarks.
    ///
    /// Weights stay within the range the compact format can store.
    #[must_use]
    pub fn synthetic(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let transformer = random_transformer(&mut rng, 60);
        let head = CompactHead::new(
            (0..2 * SMALL_WIDTH).map(|_| rng.gen_range(-250..=250)).collect(),
            rng.gen_range(-300..=300),
        );
        SmallNetwork {
            description: format!("synthetic small network (seed {seed})"),
            transformer,
            head,
        }
    }

    /// Score from the side to move's point of view.
    #[must_use]
    pub fn evaluate(&self, acc: &SmallAccumulator, stm: Color) -> NetworkOutput {
        debug_assert!(acc.is_computed(0) && acc.is_computed(1));
        NetworkOutput {
            psqt: psqt_term(acc, stm, 0),
            positional: self
                .head
                .propagate(acc.values(stm.index()), acc.values(stm.opponent().index())),
        }
    }

    /// Parse a small network in the full, the compact or the headerless
    /// compact format.
    ///
    /// A stream that starts with neither version tag is headerless and must
    /// be exactly [`HEADERLESS_SIZE`] bytes long.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, NnueError> {
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        match u32::from_le_bytes(tag) {
            VERSION => Self::read_full_body(reader),
            VERSION_COMPACT => Self::read_compact_body(reader),
            found => {
                let mut bytes = tag.to_vec();
                reader.read_to_end(&mut bytes)?;
                if bytes.len() != HEADERLESS_SIZE {
                    return Err(NnueError::BadVersion {
                        found,
                        expected: VERSION,
                    });
                }
                Self::read_headerless(&mut bytes.as_slice())
            }
        }
    }

    fn read_full_body<R: Read>(reader: &mut R) -> Result<Self, NnueError> {
        let description = read_header(reader, Self::FILE_HASH)?;
        check_hash(
            "feature transformer",
            read_u32(reader)?,
            FeatureTransformer::<SMALL_WIDTH, SMALL_PSQT_BUCKETS>::HASH,
        )?;
        let transformer = FeatureTransformer::read(reader)?;
        check_hash("output head", read_u32(reader)?, CompactHead::<SMALL_WIDTH>::HASH)?;
        let head = CompactHead::read(reader)?;
        expect_eof(reader)?;
        Ok(SmallNetwork {
            description,
            transformer,
            head,
        })
    }

    /// i8 weights `[piece][pov][neuron][square]`, decoded through the
    /// override table, followed by the i8 biases.
    fn read_compact_transformer<R: Read>(reader: &mut R) -> io::Result<(Vec<i16>, Vec<i16>)> {
        let raw = read_i8_vec(reader, FEATURE_COUNT * SMALL_WIDTH)?;
        let mut weights = vec![0i16; FEATURE_COUNT * SMALL_WIDTH];
        for (i, &byte) in raw.iter().enumerate() {
            let (slot, piece, pov) = compact_weight_slot(i);
            weights[slot] = remap::decode(piece, pov, byte);
        }
        let biases = read_i8_vec(reader, SMALL_WIDTH)?
            .into_iter()
            .map(i16::from)
            .collect();
        Ok((biases, weights))
    }

    /// Compact layout: file hash, compact transformer, i32 PSQT, head.
    fn read_compact_body<R: Read>(reader: &mut R) -> Result<Self, NnueError> {
        check_hash("file", read_u32(reader)?, Self::FILE_HASH)?;
        let (biases, weights) = Self::read_compact_transformer(reader)?;
        let psqt = read_i32_vec(reader, FEATURE_COUNT * SMALL_PSQT_BUCKETS)?;
        let head = CompactHead::read(reader)?;
        expect_eof(reader)?;
        Ok(SmallNetwork {
            description: String::new(),
            transformer: FeatureTransformer::new(biases, weights, psqt),
            head,
        })
    }

    /// Headerless layout: compact transformer and head, nothing else. The
    /// PSQT weights are zero.
    fn read_headerless<R: Read>(reader: &mut R) -> Result<Self, NnueError> {
        let (biases, weights) = Self::read_compact_transformer(reader)?;
        let head = CompactHead::read(reader)?;
        expect_eof(reader)?;
        log::debug!("small network has no header, PSQT weights are zero");
        Ok(SmallNetwork {
            description: String::new(),
            transformer: FeatureTransformer::new(
                biases,
                weights,
                vec![0; FEATURE_COUNT * SMALL_PSQT_BUCKETS],
            ),
            head,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_header(writer, Self::FILE_HASH, &self.description)?;
        write_u32(writer, SmallTransformer::HASH)?;
        self.transformer.write(writer)?;
        write_u32(writer, CompactHead::<SMALL_WIDTH>::HASH)?;
        self.head.write(writer)
    }

    /// Compact transformer block shared by the compact and headerless formats.
    fn write_compact_transformer<W: Write>(&self, writer: &mut W) -> Result<(), NnueError> {
        let mut raw = vec![0i8; FEATURE_COUNT * SMALL_WIDTH];
        for (i, byte) in raw.iter_mut().enumerate() {
            let (slot, piece, pov) = compact_weight_slot(i);
            let value = self.transformer.weights[slot];
            *byte = remap::encode(piece, pov, value).ok_or_else(|| unencodable("weight", value))?;
        }
        write_i8_slice(writer, &raw)?;

        let biases = self
            .transformer
            .biases
            .iter()
            .map(|&b| i8::try_from(b).map_err(|_| unencodable("bias", b)))
            .collect::<Result<Vec<i8>, _>>()?;
        write_i8_slice(writer, &biases)?;
        Ok(())
    }

    /// Write the compact format. Fails if a weight or bias has no byte code.
    pub fn write_compact<W: Write>(&self, writer: &mut W) -> Result<(), NnueError> {
        write_u32(writer, VERSION_COMPACT)?;
        write_u32(writer, Self::FILE_HASH)?;
        self.write_compact_transformer(writer)?;
        write_i32_slice(writer, &self.transformer.psqt_weights)?;
        self.head.write(writer)?;
        Ok(())
    }

    /// Write the headerless compact format. Fails on weights without a byte
    /// code and on nonzero PSQT weights, which the format cannot hold.
    pub fn write_headerless<W: Write>(&self, writer: &mut W) -> Result<(), NnueError> {
        if self.transformer.psqt_weights.iter().any(|&w| w != 0) {
            return Err(NnueError::BadDimensions(
                "headerless small network cannot store PSQT weights".to_string(),
            ));
        }
        self.write_compact_transformer(writer)?;
        write_i16_slice(writer, &self.head.weights)?;
        write_i16_slice(writer, &[self.head.bias])?;
        Ok(())
    }
}

fn unencodable(what: &str, value: i16) -> NnueError {
    NnueError::BadDimensions(format!("{what} {value} has no compact encoding"))
}

// ============================================================================
// Loaded network bundle
// ============================================================================

/// Name of the file currently loaded for each size class
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalFileIdentity {
    pub big: String,
    pub small: String,
    pub classifier: String,
}

impl Default for EvalFileIdentity {
    fn default() -> Self {
        EvalFileIdentity {
            big: "None".to_string(),
            small: "None".to_string(),
            classifier: "None".to_string(),
        }
    }
}

impl EvalFileIdentity {
    #[must_use]
    pub fn get(&self, size: NetSize) -> &str {
        match size {
            NetSize::Big => &self.big,
            NetSize::Small => &self.small,
            NetSize::Classifier => &self.classifier,
        }
    }

    pub fn set(&mut self, size: NetSize, name: impl Into<String>) {
        let slot = match size {
            NetSize::Big => &mut self.big,
            NetSize::Small => &mut self.small,
            NetSize::Classifier => &mut self.classifier,
        };
        *slot = name.into();
    }
}

/// Every network the evaluator needs. Immutable once built.
#[derive(Clone, Debug)]
pub struct Networks {
    pub big: Arc<BigNetwork>,
    pub small: Arc<SmallNetwork>,
    pub classifier: Option<Arc<Classifier>>,
    pub identity: EvalFileIdentity,
}

impl Networks {
    /// Synthetic networks with no classifier, for tests and benchmarks
    #[must_use]
    pub fn synthetic(seed: u64) -> Self {
        Networks {
            big: Arc::new(BigNetwork::synthetic(seed)),
            small: Arc::new(SmallNetwork::synthetic(seed.wrapping_add(1))),
            classifier: None,
            identity: EvalFileIdentity {
                big: "synthetic".to_string(),
                small: "synthetic".to_string(),
                classifier: "None".to_string(),
            },
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self.identity.classifier = "synthetic".to_string();
        self
    }
}
