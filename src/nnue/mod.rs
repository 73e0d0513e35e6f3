//! NNUE (Efficiently Updatable Neural Network) evaluation.
//!
//! Provides neural network based position evaluation with:
//! - Incremental accumulator updates, bit-exact with a full refresh
//! - A per-king-bucket refresh cache
//! - Fixed-point inference with SIMD backends (AVX2/NEON)
//! - A big layer-stack network and a small compact network, plus an
//!   auxiliary classifier deciding between them
//!
//! Big: (768 piece-square + 15008 threat -> 256) x 2 -> 8 x (512 -> 16 -> 32 -> 1)
//! Small: (768 -> 64) x 2 -> 1

pub mod accumulator;
pub mod cache;
pub mod classifier;
pub mod error;
pub mod features;
pub(crate) mod io;
pub mod layers;
pub mod loader;
pub mod network;
pub mod remap;
pub mod simd;
pub mod state;
pub mod threats;

pub use accumulator::Accumulator;
pub use cache::AccumulatorCache;
pub use classifier::{Classifier, CLASSIFIER_INPUTS};
pub use error::{NetSize, NnueError};
pub use features::{feature_index, king_bucket, requires_refresh, FeatureTransformer, FEATURE_COUNT};
pub use layers::OUTPUT_SCALE;
pub use loader::{NetworkLoader, NetworkRegistry};
pub use network::{
    BigAccumulator, BigNetwork, BigTransformer, EvalFileIdentity, NetworkOutput, Networks,
    SmallAccumulator, SmallNetwork, SmallTransformer,
};
pub use state::NnueState;
pub use threats::{DirtyThreats, Threat, THREAT_INPUTS};
