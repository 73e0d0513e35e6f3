//! Batched fixed-point arithmetic for NNUE inference.
//!
//! Every operation has a scalar reference implementation and vectorized
//! versions behind the same [`VectorOps`] trait:
//! - `x86_64`: `AVX2` (256-bit vectors), detected at runtime
//! - aarch64: NEON (128-bit vectors, always available)
//! - Fallback: `Scalar`
//!
//! All backends are bit-exact with `Scalar`. Slice lengths must be multiples
//! of [`LANE_MULTIPLE`].

/// Slice lengths handed to these routines are multiples of this
pub const LANE_MULTIPLE: usize = 32;

/// Upper clamp applied by the feature transform before the affine layers
pub const TRANSFORM_CLIP: i16 = 127;

/// Output ceiling of the clipped activation
const ACTIVATION_MAX: i32 = 126;

/// `127 << 4`: activation saturation point after the input shift
const ACTIVATION_KNEE: i32 = 127 << 4;

/// One implementation of the arithmetic kernels.
pub trait VectorOps: Copy {
    /// `acc[i] += delta[i]`, wrapping
    fn add_i16(self, acc: &mut [i16], delta: &[i16]);

    /// `acc[i] -= delta[i]`, wrapping
    fn sub_i16(self, acc: &mut [i16], delta: &[i16]);

    /// `Σ ((c·w) as i16) · c` with `c = clamp(acc, 0, clip)`, wrapping i32 sum.
    ///
    /// This is the squared clipped ReLU dot product with the first product
    /// kept in 16 bits.
    fn screlu_dot(self, acc: &[i16], weights: &[i16], clip: i16) -> i32;

    /// `Σ input · weight` into i32. Inputs must not exceed 127.
    fn dot_u8_i8(self, input: &[u8], weights: &[i8]) -> i32;

    /// `out[i] = clamp(acc[i], 0, TRANSFORM_CLIP)`
    fn clamp_to_u8(self, acc: &[i16], out: &mut [u8]);

    /// The clipped sigmoid-like activation applied between affine layers.
    fn activate(self, input: &[i32], out: &mut [u8]);
}

/// Activation of a single affine output
#[inline]
#[must_use]
pub fn activate_one(x: i32) -> u8 {
    let v = (x >> 2).abs().min(ACTIVATION_KNEE) - ACTIVATION_KNEE;
    let vv = (v * v) >> 16;
    let out = if x > 0 { ACTIVATION_MAX - vv } else { vv };
    out as u8
}

// ============================================================================
// Scalar reference
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct Scalar;

impl VectorOps for Scalar {
    fn add_i16(self, acc: &mut [i16], delta: &[i16]) {
        for (a, &d) in acc.iter_mut().zip(delta) {
            *a = a.wrapping_add(d);
        }
    }

    fn sub_i16(self, acc: &mut [i16], delta: &[i16]) {
        for (a, &d) in acc.iter_mut().zip(delta) {
            *a = a.wrapping_sub(d);
        }
    }

    fn screlu_dot(self, acc: &[i16], weights: &[i16], clip: i16) -> i32 {
        acc.iter().zip(weights).fold(0i32, |sum, (&a, &w)| {
            let c = a.clamp(0, clip);
            let product = c.wrapping_mul(w);
            sum.wrapping_add(i32::from(product) * i32::from(c))
        })
    }

    fn dot_u8_i8(self, input: &[u8], weights: &[i8]) -> i32 {
        input
            .iter()
            .zip(weights)
            .map(|(&x, &w)| i32::from(x) * i32::from(w))
            .sum()
    }

    fn clamp_to_u8(self, acc: &[i16], out: &mut [u8]) {
        for (o, &a) in out.iter_mut().zip(acc) {
            *o = a.clamp(0, TRANSFORM_CLIP) as u8;
        }
    }

    fn activate(self, input: &[i32], out: &mut [u8]) {
        for (o, &x) in out.iter_mut().zip(input) {
            *o = activate_one(x);
        }
    }
}

// ============================================================================
// AVX2 (x86_64)
// ============================================================================

/// AVX2 backend. Only constructible on CPUs that support it.
#[cfg(target_arch = "x86_64")]
#[derive(Clone, Copy, Debug)]
pub struct Avx2 {
    _detected: (),
}

#[cfg(target_arch = "x86_64")]
impl Avx2 {
    #[inline]
    #[must_use]
    pub fn detect() -> Option<Self> {
        if is_x86_feature_detected!("avx2") {
            Some(Avx2 { _detected: () })
        } else {
            None
        }
    }
}

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::{ACTIVATION_KNEE, ACTIVATION_MAX, TRANSFORM_CLIP};
    use std::arch::x86_64::*;

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn add_i16(acc: &mut [i16], delta: &[i16]) {
        let acc_ptr = acc.as_mut_ptr();
        let delta_ptr = delta.as_ptr();
        for i in (0..acc.len()).step_by(16) {
            let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
            let d = _mm256_loadu_si256(delta_ptr.add(i) as *const __m256i);
            _mm256_storeu_si256(acc_ptr.add(i) as *mut __m256i, _mm256_add_epi16(a, d));
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn sub_i16(acc: &mut [i16], delta: &[i16]) {
        let acc_ptr = acc.as_mut_ptr();
        let delta_ptr = delta.as_ptr();
        for i in (0..acc.len()).step_by(16) {
            let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
            let d = _mm256_loadu_si256(delta_ptr.add(i) as *const __m256i);
            _mm256_storeu_si256(acc_ptr.add(i) as *mut __m256i, _mm256_sub_epi16(a, d));
        }
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn hsum_i32(v: __m256i) -> i32 {
        let sum128 = _mm_add_epi32(_mm256_castsi256_si128(v), _mm256_extracti128_si256(v, 1));
        let sum64 = _mm_add_epi32(sum128, _mm_unpackhi_epi64(sum128, sum128));
        let sum32 = _mm_add_epi32(sum64, _mm_shuffle_epi32(sum64, 1));
        _mm_cvtsi128_si32(sum32)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn screlu_dot(acc: &[i16], weights: &[i16], clip: i16) -> i32 {
        let acc_ptr = acc.as_ptr();
        let weights_ptr = weights.as_ptr();
        let zero = _mm256_setzero_si256();
        let ceiling = _mm256_set1_epi16(clip);
        let mut sum = _mm256_setzero_si256();

        for i in (0..acc.len()).step_by(16) {
            let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
            let w = _mm256_loadu_si256(weights_ptr.add(i) as *const __m256i);
            let clamped = _mm256_min_epi16(_mm256_max_epi16(a, zero), ceiling);
            // c·w kept in 16 bits, then (c·w)·c widened and pair-summed
            let product = _mm256_mullo_epi16(clamped, w);
            sum = _mm256_add_epi32(sum, _mm256_madd_epi16(product, clamped));
        }
        hsum_i32(sum)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn dot_u8_i8(input: &[u8], weights: &[i8]) -> i32 {
        let input_ptr = input.as_ptr();
        let weights_ptr = weights.as_ptr();
        let ones = _mm256_set1_epi16(1);
        let mut sum = _mm256_setzero_si256();

        for i in (0..input.len()).step_by(32) {
            let x = _mm256_loadu_si256(input_ptr.add(i) as *const __m256i);
            let w = _mm256_loadu_si256(weights_ptr.add(i) as *const __m256i);
            // Pair sums are at most 2·127·128, so maddubs never saturates
            let product = _mm256_maddubs_epi16(x, w);
            sum = _mm256_add_epi32(sum, _mm256_madd_epi16(product, ones));
        }
        hsum_i32(sum)
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn clamp_to_u8(acc: &[i16], out: &mut [u8]) {
        let acc_ptr = acc.as_ptr();
        let out_ptr = out.as_mut_ptr();
        let zero = _mm256_setzero_si256();
        let ceiling = _mm256_set1_epi16(TRANSFORM_CLIP);

        for i in (0..acc.len()).step_by(32) {
            let a = _mm256_loadu_si256(acc_ptr.add(i) as *const __m256i);
            let b = _mm256_loadu_si256(acc_ptr.add(i + 16) as *const __m256i);
            let a = _mm256_min_epi16(_mm256_max_epi16(a, zero), ceiling);
            let b = _mm256_min_epi16(_mm256_max_epi16(b, zero), ceiling);
            // packus interleaves 128-bit lanes; the permute restores order
            let packed = _mm256_permute4x64_epi64(_mm256_packus_epi16(a, b), 0b11_01_10_00);
            _mm256_storeu_si256(out_ptr.add(i) as *mut __m256i, packed);
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn activate(input: &[i32], out: &mut [u8]) {
        let input_ptr = input.as_ptr();
        let knee = _mm256_set1_epi32(ACTIVATION_KNEE);
        let max = _mm256_set1_epi32(ACTIVATION_MAX);
        let zero = _mm256_setzero_si256();
        let mut lanes = [0i32; 8];

        for i in (0..input.len()).step_by(8) {
            let x = _mm256_loadu_si256(input_ptr.add(i) as *const __m256i);
            let v = _mm256_sub_epi32(
                _mm256_min_epi32(_mm256_abs_epi32(_mm256_srai_epi32(x, 2)), knee),
                knee,
            );
            let vv = _mm256_srai_epi32(_mm256_mullo_epi32(v, v), 16);
            let positive = _mm256_cmpgt_epi32(x, zero);
            let result = _mm256_blendv_epi8(vv, _mm256_sub_epi32(max, vv), positive);
            _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, result);
            for (o, &lane) in out[i..i + 8].iter_mut().zip(&lanes) {
                *o = lane as u8;
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
impl VectorOps for Avx2 {
    #[inline]
    fn add_i16(self, acc: &mut [i16], delta: &[i16]) {
        debug_assert_eq!(acc.len(), delta.len());
        // SAFETY: an `Avx2` value only exists when the CPU supports AVX2
        unsafe { avx2::add_i16(acc, delta) }
    }

    #[inline]
    fn sub_i16(self, acc: &mut [i16], delta: &[i16]) {
        debug_assert_eq!(acc.len(), delta.len());
        unsafe { avx2::sub_i16(acc, delta) }
    }

    #[inline]
    fn screlu_dot(self, acc: &[i16], weights: &[i16], clip: i16) -> i32 {
        debug_assert_eq!(acc.len(), weights.len());
        unsafe { avx2::screlu_dot(acc, weights, clip) }
    }

    #[inline]
    fn dot_u8_i8(self, input: &[u8], weights: &[i8]) -> i32 {
        debug_assert_eq!(input.len(), weights.len());
        unsafe { avx2::dot_u8_i8(input, weights) }
    }

    #[inline]
    fn clamp_to_u8(self, acc: &[i16], out: &mut [u8]) {
        debug_assert_eq!(acc.len(), out.len());
        unsafe { avx2::clamp_to_u8(acc, out) }
    }

    #[inline]
    fn activate(self, input: &[i32], out: &mut [u8]) {
        debug_assert!(out.len() >= input.len());
        unsafe { avx2::activate(input, out) }
    }
}

// ============================================================================
// NEON (aarch64)
// ============================================================================

#[cfg(target_arch = "aarch64")]
#[derive(Clone, Copy, Debug, Default)]
pub struct Neon;

#[cfg(target_arch = "aarch64")]
mod neon {
    use super::{ACTIVATION_KNEE, ACTIVATION_MAX, TRANSFORM_CLIP};
    use std::arch::aarch64::*;

    pub(super) unsafe fn add_i16(acc: &mut [i16], delta: &[i16]) {
        let acc_ptr = acc.as_mut_ptr();
        let delta_ptr = delta.as_ptr();
        for i in (0..acc.len()).step_by(8) {
            let sum = vaddq_s16(vld1q_s16(acc_ptr.add(i)), vld1q_s16(delta_ptr.add(i)));
            vst1q_s16(acc_ptr.add(i), sum);
        }
    }

    pub(super) unsafe fn sub_i16(acc: &mut [i16], delta: &[i16]) {
        let acc_ptr = acc.as_mut_ptr();
        let delta_ptr = delta.as_ptr();
        for i in (0..acc.len()).step_by(8) {
            let diff = vsubq_s16(vld1q_s16(acc_ptr.add(i)), vld1q_s16(delta_ptr.add(i)));
            vst1q_s16(acc_ptr.add(i), diff);
        }
    }

    pub(super) unsafe fn screlu_dot(acc: &[i16], weights: &[i16], clip: i16) -> i32 {
        let acc_ptr = acc.as_ptr();
        let weights_ptr = weights.as_ptr();
        let zero = vdupq_n_s16(0);
        let ceiling = vdupq_n_s16(clip);
        let mut sum = vdupq_n_s32(0);

        for i in (0..acc.len()).step_by(8) {
            let a = vld1q_s16(acc_ptr.add(i));
            let w = vld1q_s16(weights_ptr.add(i));
            let clamped = vminq_s16(vmaxq_s16(a, zero), ceiling);
            let product = vmulq_s16(clamped, w);
            sum = vmlal_s16(sum, vget_low_s16(product), vget_low_s16(clamped));
            sum = vmlal_s16(sum, vget_high_s16(product), vget_high_s16(clamped));
        }
        vaddvq_s32(sum)
    }

    pub(super) unsafe fn dot_u8_i8(input: &[u8], weights: &[i8]) -> i32 {
        let input_ptr = input.as_ptr() as *const i8;
        let weights_ptr = weights.as_ptr();
        let mut sum = vdupq_n_s32(0);

        for i in (0..input.len()).step_by(16) {
            // Inputs are at most 127, so they read the same as signed bytes
            let x = vld1q_s8(input_ptr.add(i));
            let w = vld1q_s8(weights_ptr.add(i));
            let lo = vmull_s8(vget_low_s8(x), vget_low_s8(w));
            let hi = vmull_s8(vget_high_s8(x), vget_high_s8(w));
            sum = vpadalq_s16(sum, lo);
            sum = vpadalq_s16(sum, hi);
        }
        vaddvq_s32(sum)
    }

    pub(super) unsafe fn clamp_to_u8(acc: &[i16], out: &mut [u8]) {
        let acc_ptr = acc.as_ptr();
        let out_ptr = out.as_mut_ptr();
        let zero = vdupq_n_s16(0);
        let ceiling = vdupq_n_s16(TRANSFORM_CLIP);

        for i in (0..acc.len()).step_by(8) {
            let clamped = vminq_s16(vmaxq_s16(vld1q_s16(acc_ptr.add(i)), zero), ceiling);
            vst1_u8(out_ptr.add(i), vqmovun_s16(clamped));
        }
    }

    pub(super) unsafe fn activate(input: &[i32], out: &mut [u8]) {
        let input_ptr = input.as_ptr();
        let knee = vdupq_n_s32(ACTIVATION_KNEE);
        let max = vdupq_n_s32(ACTIVATION_MAX);
        let zero = vdupq_n_s32(0);
        let mut lanes = [0i32; 4];

        for i in (0..input.len()).step_by(4) {
            let x = vld1q_s32(input_ptr.add(i));
            let v = vsubq_s32(vminq_s32(vabsq_s32(vshrq_n_s32::<2>(x)), knee), knee);
            let vv = vshrq_n_s32::<16>(vmulq_s32(v, v));
            let positive = vcgtq_s32(x, zero);
            let result = vbslq_s32(positive, vsubq_s32(max, vv), vv);
            vst1q_s32(lanes.as_mut_ptr(), result);
            for (o, &lane) in out[i..i + 4].iter_mut().zip(&lanes) {
                *o = lane as u8;
            }
        }
    }
}

#[cfg(target_arch = "aarch64")]
impl VectorOps for Neon {
    #[inline]
    fn add_i16(self, acc: &mut [i16], delta: &[i16]) {
        debug_assert_eq!(acc.len(), delta.len());
        // SAFETY: NEON is always available on aarch64
        unsafe { neon::add_i16(acc, delta) }
    }

    #[inline]
    fn sub_i16(self, acc: &mut [i16], delta: &[i16]) {
        debug_assert_eq!(acc.len(), delta.len());
        unsafe { neon::sub_i16(acc, delta) }
    }

    #[inline]
    fn screlu_dot(self, acc: &[i16], weights: &[i16], clip: i16) -> i32 {
        debug_assert_eq!(acc.len(), weights.len());
        unsafe { neon::screlu_dot(acc, weights, clip) }
    }

    #[inline]
    fn dot_u8_i8(self, input: &[u8], weights: &[i8]) -> i32 {
        debug_assert_eq!(input.len(), weights.len());
        unsafe { neon::dot_u8_i8(input, weights) }
    }

    #[inline]
    fn clamp_to_u8(self, acc: &[i16], out: &mut [u8]) {
        debug_assert_eq!(acc.len(), out.len());
        unsafe { neon::clamp_to_u8(acc, out) }
    }

    #[inline]
    fn activate(self, input: &[i32], out: &mut [u8]) {
        debug_assert!(out.len() >= input.len());
        unsafe { neon::activate(input, out) }
    }
}

// ============================================================================
// Public API - dispatches to the best backend for this CPU
// ============================================================================

macro_rules! dispatch {
    ($method:ident($($arg:expr),*)) => {{
        #[cfg(target_arch = "aarch64")]
        {
            Neon.$method($($arg),*)
        }

        #[cfg(target_arch = "x86_64")]
        {
            match Avx2::detect() {
                Some(backend) => backend.$method($($arg),*),
                None => Scalar.$method($($arg),*),
            }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Scalar.$method($($arg),*)
        }
    }};
}

/// Add a weight row to an accumulator half.
#[inline]
pub fn add_weights(acc: &mut [i16], weights: &[i16]) {
    dispatch!(add_i16(acc, weights))
}

/// Subtract a weight row from an accumulator half.
#[inline]
pub fn sub_weights(acc: &mut [i16], weights: &[i16]) {
    dispatch!(sub_i16(acc, weights))
}

#[inline]
#[must_use]
pub fn screlu_dot(acc: &[i16], weights: &[i16], clip: i16) -> i32 {
    dispatch!(screlu_dot(acc, weights, clip))
}

#[inline]
#[must_use]
pub fn dot_u8_i8(input: &[u8], weights: &[i8]) -> i32 {
    dispatch!(dot_u8_i8(input, weights))
}

#[inline]
pub fn clamp_to_u8(acc: &[i16], out: &mut [u8]) {
    dispatch!(clamp_to_u8(acc, out))
}

#[inline]
pub fn activate(input: &[i32], out: &mut [u8]) {
    dispatch!(activate(input, out))
}

/// Name of the backend the dispatcher picks on this CPU.
#[must_use]
pub fn backend_name() -> &'static str {
    #[cfg(target_arch = "aarch64")]
    {
        "neon"
    }

    #[cfg(target_arch = "x86_64")]
    {
        if Avx2::detect().is_some() {
            "avx2"
        } else {
            "scalar"
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        "scalar"
    }
}
