//! Feature accumulators.
//!
//! One contiguous `[[i16; W]; 2]` buffer holds both perspectives. It can be
//! viewed per perspective or as a single flat `2·W` slice.

/// Accumulated first-layer outputs of one position.
#[derive(Clone, Debug, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct Accumulator<const W: usize, const B: usize> {
    pub(crate) values: [[i16; W]; 2],
    pub(crate) psqt: [[i32; B]; 2],
    pub(crate) computed: [bool; 2],
}

impl<const W: usize, const B: usize> Default for Accumulator<W, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize, const B: usize> Accumulator<W, B> {
    #[must_use]
    pub const fn new() -> Self {
        Accumulator {
            values: [[0; W]; 2],
            psqt: [[0; B]; 2],
            computed: [false; 2],
        }
    }

    /// Values for one perspective (0 = White, 1 = Black)
    #[inline]
    #[must_use]
    pub fn values(&self, perspective: usize) -> &[i16; W] {
        &self.values[perspective]
    }

    /// Both perspectives as one slice, White first
    #[inline]
    #[must_use]
    pub fn flat(&self) -> &[i16] {
        self.values.as_flattened()
    }

    #[inline]
    #[must_use]
    pub fn psqt(&self, perspective: usize) -> &[i32; B] {
        &self.psqt[perspective]
    }

    #[inline]
    #[must_use]
    pub fn is_computed(&self, perspective: usize) -> bool {
        self.computed[perspective]
    }

    /// Mark both perspectives stale.
    #[inline]
    pub fn invalidate(&mut self) {
        self.computed = [false; 2];
    }
}
