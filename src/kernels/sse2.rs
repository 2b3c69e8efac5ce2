//! SSE2 implementations of `LaneVector` for x86_64.
//!
//! SSE2 is part of the x86_64 baseline, so every intrinsic used here is
//! available whenever this module is compiled. The runtime check in
//! `detect` still gates selection so that the scalar path can be forced.
//!
//! SSE2 has no 8-bit shifts and no 64-bit arithmetic shift; those are
//! synthesised from the 16-bit and 32-bit forms.

use std::arch::x86_64::*;

use crate::kernels::lanes::LaneVector;

#[derive(Debug, Clone, Copy)]
pub struct Sse2U8(__m128i);

#[derive(Debug, Clone, Copy)]
pub struct Sse2U16(__m128i);

#[derive(Debug, Clone, Copy)]
pub struct Sse2U32(__m128i);

#[derive(Debug, Clone, Copy)]
pub struct Sse2U64(__m128i);

/// Unaligned load/store, zero and or are the same for every lane width.
macro_rules! sse2_common {
    ($U:ty, $lanes:expr) => {
        const LANES: usize = $lanes;

        #[inline(always)]
        fn load(src: &[$U]) -> Self {
            let src = &src[..$lanes];
            unsafe { Self(_mm_loadu_si128(src.as_ptr() as *const __m128i)) }
        }

        #[inline(always)]
        fn store(self, dst: &mut [$U]) {
            let dst = &mut dst[..$lanes];
            unsafe { _mm_storeu_si128(dst.as_mut_ptr() as *mut __m128i, self.0) }
        }

        #[inline(always)]
        fn zero() -> Self {
            unsafe { Self(_mm_setzero_si128()) }
        }

        #[inline(always)]
        fn or(self, other: Self) -> Self {
            unsafe { Self(_mm_or_si128(self.0, other.0)) }
        }
    };
}

//==================================================================================
// 8-bit lanes
//==================================================================================

impl LaneVector<u8> for Sse2U8 {
    sse2_common!(u8, 16);

    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        if n >= 8 {
            return Self::zero();
        }
        unsafe {
            let shifted = _mm_sll_epi16(self.0, _mm_cvtsi32_si128(n as i32));
            Self(_mm_and_si128(shifted, _mm_set1_epi8((0xffu8 << n) as i8)))
        }
    }

    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        if n >= 8 {
            return Self::zero();
        }
        unsafe {
            let shifted = _mm_srl_epi16(self.0, _mm_cvtsi32_si128(n as i32));
            Self(_mm_and_si128(shifted, _mm_set1_epi8((0xffu8 >> n) as i8)))
        }
    }

    #[inline(always)]
    fn fold_sign(self) -> Self {
        unsafe {
            let negative = _mm_cmplt_epi8(self.0, _mm_setzero_si128());
            let flip = _mm_and_si128(negative, _mm_set1_epi8(0x7f));
            Self(_mm_xor_si128(self.0, flip))
        }
    }

    #[inline(always)]
    fn rotate_left_one(self) -> Self {
        unsafe {
            let doubled = _mm_add_epi8(self.0, self.0);
            let carry = _mm_and_si128(
                _mm_cmplt_epi8(self.0, _mm_setzero_si128()),
                _mm_set1_epi8(1),
            );
            Self(_mm_or_si128(doubled, carry))
        }
    }

    #[inline(always)]
    fn rotate_right_one(self) -> Self {
        unsafe {
            let halved = _mm_and_si128(_mm_srli_epi16(self.0, 1), _mm_set1_epi8(0x7f));
            let low = _mm_slli_epi16(_mm_and_si128(self.0, _mm_set1_epi8(1)), 7);
            Self(_mm_or_si128(halved, low))
        }
    }

    #[inline(always)]
    fn gather_msb(self) -> u32 {
        unsafe { _mm_movemask_epi8(self.0) as u32 }
    }

    #[inline(always)]
    fn scatter_msb(mask: u32) -> Self {
        unsafe {
            let lo = mask as u8 as i8;
            let hi = (mask >> 8) as u8 as i8;
            let v = _mm_set_epi8(hi, hi, hi, hi, hi, hi, hi, hi, lo, lo, lo, lo, lo, lo, lo, lo);
            let bits = _mm_set_epi8(
                -128, 64, 32, 16, 8, 4, 2, 1, -128, 64, 32, 16, 8, 4, 2, 1,
            );
            let selected = _mm_cmpeq_epi8(_mm_and_si128(v, bits), bits);
            Self(_mm_and_si128(selected, _mm_set1_epi8(i8::MIN)))
        }
    }
}

//==================================================================================
// 16-bit lanes
//==================================================================================

impl LaneVector<u16> for Sse2U16 {
    sse2_common!(u16, 8);

    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        if n >= 16 {
            return Self::zero();
        }
        unsafe { Self(_mm_sll_epi16(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        if n >= 16 {
            return Self::zero();
        }
        unsafe { Self(_mm_srl_epi16(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    #[inline(always)]
    fn fold_sign(self) -> Self {
        unsafe {
            let negative = _mm_srai_epi16(self.0, 15);
            let flip = _mm_and_si128(negative, _mm_set1_epi16(0x7fff));
            Self(_mm_xor_si128(self.0, flip))
        }
    }

    #[inline(always)]
    fn rotate_left_one(self) -> Self {
        unsafe { Self(_mm_or_si128(_mm_slli_epi16(self.0, 1), _mm_srli_epi16(self.0, 15))) }
    }

    #[inline(always)]
    fn rotate_right_one(self) -> Self {
        unsafe { Self(_mm_or_si128(_mm_srli_epi16(self.0, 1), _mm_slli_epi16(self.0, 15))) }
    }

    #[inline(always)]
    fn gather_msb(self) -> u32 {
        // Signed saturation keeps the sign of every lane in its byte.
        unsafe { (_mm_movemask_epi8(_mm_packs_epi16(self.0, _mm_setzero_si128())) & 0xff) as u32 }
    }

    #[inline(always)]
    fn scatter_msb(mask: u32) -> Self {
        unsafe {
            let v = _mm_set1_epi16(mask as u16 as i16);
            let bits = _mm_set_epi16(128, 64, 32, 16, 8, 4, 2, 1);
            let selected = _mm_cmpeq_epi16(_mm_and_si128(v, bits), bits);
            Self(_mm_and_si128(selected, _mm_set1_epi16(i16::MIN)))
        }
    }
}

//==================================================================================
// 32-bit lanes
//==================================================================================

impl LaneVector<u32> for Sse2U32 {
    sse2_common!(u32, 4);

    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        if n >= 32 {
            return Self::zero();
        }
        unsafe { Self(_mm_sll_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        if n >= 32 {
            return Self::zero();
        }
        unsafe { Self(_mm_srl_epi32(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    #[inline(always)]
    fn fold_sign(self) -> Self {
        unsafe {
            let negative = _mm_srai_epi32(self.0, 31);
            let flip = _mm_and_si128(negative, _mm_set1_epi32(i32::MAX));
            Self(_mm_xor_si128(self.0, flip))
        }
    }

    #[inline(always)]
    fn rotate_left_one(self) -> Self {
        unsafe { Self(_mm_or_si128(_mm_slli_epi32(self.0, 1), _mm_srli_epi32(self.0, 31))) }
    }

    #[inline(always)]
    fn rotate_right_one(self) -> Self {
        unsafe { Self(_mm_or_si128(_mm_srli_epi32(self.0, 1), _mm_slli_epi32(self.0, 31))) }
    }

    #[inline(always)]
    fn gather_msb(self) -> u32 {
        unsafe { _mm_movemask_ps(_mm_castsi128_ps(self.0)) as u32 }
    }

    #[inline(always)]
    fn scatter_msb(mask: u32) -> Self {
        unsafe {
            let v = _mm_set1_epi32(mask as i32);
            let bits = _mm_set_epi32(8, 4, 2, 1);
            let selected = _mm_cmpeq_epi32(_mm_and_si128(v, bits), bits);
            Self(_mm_and_si128(selected, _mm_set1_epi32(i32::MIN)))
        }
    }
}

//==================================================================================
// 64-bit lanes
//==================================================================================

impl LaneVector<u64> for Sse2U64 {
    sse2_common!(u64, 2);

    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        if n >= 64 {
            return Self::zero();
        }
        unsafe { Self(_mm_sll_epi64(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        if n >= 64 {
            return Self::zero();
        }
        unsafe { Self(_mm_srl_epi64(self.0, _mm_cvtsi32_si128(n as i32))) }
    }

    #[inline(always)]
    fn fold_sign(self) -> Self {
        unsafe {
            // Broadcast the high dword's sign over its whole 64-bit lane.
            let negative = _mm_shuffle_epi32(_mm_srai_epi32(self.0, 31), 0xF5);
            let flip = _mm_and_si128(negative, _mm_set1_epi64x(i64::MAX));
            Self(_mm_xor_si128(self.0, flip))
        }
    }

    #[inline(always)]
    fn rotate_left_one(self) -> Self {
        unsafe { Self(_mm_or_si128(_mm_slli_epi64(self.0, 1), _mm_srli_epi64(self.0, 63))) }
    }

    #[inline(always)]
    fn rotate_right_one(self) -> Self {
        unsafe { Self(_mm_or_si128(_mm_srli_epi64(self.0, 1), _mm_slli_epi64(self.0, 63))) }
    }

    #[inline(always)]
    fn gather_msb(self) -> u32 {
        unsafe { _mm_movemask_pd(_mm_castsi128_pd(self.0)) as u32 }
    }

    #[inline(always)]
    fn scatter_msb(mask: u32) -> Self {
        unsafe {
            let v = _mm_set1_epi32(mask as i32);
            let bits = _mm_set_epi32(2, 2, 1, 1);
            let selected = _mm_cmpeq_epi32(_mm_and_si128(v, bits), bits);
            Self(_mm_and_si128(selected, _mm_set1_epi64x(i64::MIN)))
        }
    }
}
