//! Runtime SIMD capability probe and 128-bit f32 lane primitives.
//!
//! ## Purpose
//! The bulk-apply engine computes in lanes of four 32-bit floats when the
//! host supports it. This module owns the runtime probe and the thin
//! wrappers over the `core::arch` intrinsics the kernels are built from.
//!
//! The probe is an explicit, owned object constructed with the world;
//! there is no process-wide singleton to consult.
//!
//! ## Rounding
//! Lane arithmetic uses single-precision IEEE-754 add/sub/mul exactly as
//! the scalar fallback does, so results are bit-identical between the two
//! paths for `add`/`sub`/`mul`/`scale`.

/// Host SIMD capability, probed once at construction.
#[derive(Clone, Copy, Debug)]
pub struct SimdProbe {
    lanes4: bool,
}

impl Default for SimdProbe {
    fn default() -> Self {
        Self::detect()
    }
}

impl SimdProbe {
    /// Probes the running host.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self { lanes4: std::arch::is_x86_feature_detected!("sse4.1") }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            Self { lanes4: false }
        }
    }

    /// Returns a probe that always reports "unsupported" (scalar only).
    pub fn disabled() -> Self {
        Self { lanes4: false }
    }

    /// Returns `true` if four-lane f32 kernels may be dispatched.
    #[inline]
    pub fn lanes4(&self) -> bool {
        self.lanes4
    }
}

#[cfg(target_arch = "x86_64")]
pub(crate) mod x86 {
    //! Four-lane helpers over SSE4.1.
    //!
    //! Every function is `#[target_feature(enable = "sse4.1")]`; callers
    //! must have verified the probe before dispatching into this module.

    use std::arch::x86_64::*;

    use crate::engine::random::{LCG_INC, LCG_MUL, LCG_SCALE};

    /// Loads four consecutive f32 values.
    ///
    /// # Safety
    /// `ptr` must be valid for reading four `f32` values.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn load(ptr: *const f32) -> __m128 {
        unsafe { _mm_loadu_ps(ptr) }
    }

    /// Stores four consecutive f32 values.
    ///
    /// # Safety
    /// `ptr` must be valid for writing four `f32` values.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn store(ptr: *mut f32, value: __m128) {
        unsafe { _mm_storeu_ps(ptr, value) }
    }

    /// Broadcasts a scalar across four lanes.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn splat(value: f32) -> __m128 {
        unsafe { _mm_set1_ps(value) }
    }

    /// Lane-wise addition.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn add(a: __m128, b: __m128) -> __m128 {
        unsafe { _mm_add_ps(a, b) }
    }

    /// Lane-wise subtraction.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn sub(a: __m128, b: __m128) -> __m128 {
        unsafe { _mm_sub_ps(a, b) }
    }

    /// Lane-wise multiplication.
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn mul(a: __m128, b: __m128) -> __m128 {
        unsafe { _mm_mul_ps(a, b) }
    }

    /// Steps four LCG lanes in parallel and returns draws in `[min, max)`.
    ///
    /// The state mutates in place; lane `k` of the result corresponds to
    /// state lane `k`, matching the scalar path's `i % 4` addressing.
    ///
    /// # Safety
    /// Requires SSE4.1 (`_mm_mullo_epi32`).
    #[inline]
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn random(state: &mut [u32; 4], min: f32, max: f32) -> __m128 {
        unsafe {
            let lanes = _mm_loadu_si128(state.as_ptr() as *const __m128i);
            let stepped = _mm_add_epi32(
                _mm_mullo_epi32(lanes, _mm_set1_epi32(LCG_MUL as i32)),
                _mm_set1_epi32(LCG_INC as i32),
            );
            _mm_storeu_si128(state.as_mut_ptr() as *mut __m128i, stepped);

            // (state >> 8) < 2^24, so the i32 → f32 conversion is exact.
            let unit = _mm_mul_ps(_mm_cvtepi32_ps(_mm_srli_epi32::<8>(stepped)), _mm_set1_ps(LCG_SCALE));
            _mm_add_ps(_mm_set1_ps(min), _mm_mul_ps(unit, _mm_set1_ps(max - min)))
        }
    }
}
