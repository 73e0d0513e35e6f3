//! Error types for network loading and verification.

use std::io;

use thiserror::Error;

/// Network size class, used in diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetSize {
    Big,
    Small,
    Classifier,
}

impl NetSize {
    pub const ALL: [NetSize; 3] = [NetSize::Big, NetSize::Small, NetSize::Classifier];

    /// Name of the option selecting this class's file
    #[must_use]
    pub const fn option_name(self) -> &'static str {
        match self {
            NetSize::Big => "EvalFileBig",
            NetSize::Small => "EvalFile",
            NetSize::Classifier => "EvalFileClassifier",
        }
    }
}

impl std::fmt::Display for NetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetSize::Big => write!(f, "big"),
            NetSize::Small => write!(f, "small"),
            NetSize::Classifier => write!(f, "classifier"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NnueError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported network version 0x{found:08X}, expected 0x{expected:08X}")]
    BadVersion { found: u32, expected: u32 },
    #[error("network hash mismatch in {section}: found 0x{found:08X}, expected 0x{expected:08X}")]
    HashMismatch {
        section: &'static str,
        found: u32,
        expected: u32,
    },
    #[error("bad classifier magic {found:?}")]
    BadMagic { found: [u8; 4] },
    #[error("bad dimensions: {0}")]
    BadDimensions(String),
    #[error("network file '{requested}' for the {size} network was not loaded (using '{loaded}')")]
    NotLoaded {
        size: NetSize,
        requested: String,
        loaded: String,
    },
}

impl NnueError {
    /// True if the error came from a truncated or unreadable stream.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, NnueError::Io(_))
    }
}
