//! This module contains the scalar bit primitives shared by every bitplane
//! kernel: sign-folding, single-bit rotation, "set n bits at offset" and the
//! plane layout arithmetic.
//!
//! Every kernel views a segment of the output as an MSB-first bit stream of
//! `W`-bit words, where element `i` owns the stream bits `[i*P, (i+1)*P)`.
//! `read_stream_bits` and `write_stream_bits` are the two accessors for that
//! stream; the scalar and vector kernels are both written against them.

use bytemuck::Pod;
use num_traits::{PrimInt, Unsigned};
use std::fmt::Debug;

use crate::error::BitswapError;
use crate::kernels::lanes::{LaneVector, PortableLanes};

//==================================================================================
// 1. The Word Trait
//==================================================================================

/// An unsigned machine word the bitplane kernels operate on.
pub trait BitWord: PrimInt + Unsigned + Pod + Debug + Send + Sync + 'static {
    /// Width of the word in bits.
    const WIDTH: u32;

    /// Register type used when no intrinsics are available.
    type Portable: LaneVector<Self>;

    /// Register type backed by SSE2 intrinsics.
    #[cfg(target_arch = "x86_64")]
    type Sse2: LaneVector<Self>;

    /// Zero-extends the word into a `u128`.
    fn widen(self) -> u128;

    /// Keeps the low `WIDTH` bits of `v`.
    fn narrow(v: u128) -> Self;
}

macro_rules! impl_bit_word {
    ($U:ty, $lanes:expr, $sse:ty) => {
        impl BitWord for $U {
            const WIDTH: u32 = <$U>::BITS;
            type Portable = PortableLanes<$U, $lanes>;
            #[cfg(target_arch = "x86_64")]
            type Sse2 = $sse;

            #[inline(always)]
            fn widen(self) -> u128 {
                self as u128
            }

            #[inline(always)]
            fn narrow(v: u128) -> Self {
                v as $U
            }
        }
    };
}

#[cfg(target_arch = "x86_64")]
use crate::kernels::sse2::{Sse2U16, Sse2U32, Sse2U64, Sse2U8};

impl_bit_word!(u8, 16, Sse2U8);
impl_bit_word!(u16, 8, Sse2U16);
impl_bit_word!(u32, 4, Sse2U32);
impl_bit_word!(u64, 2, Sse2U64);

//==================================================================================
// 2. Scalar Primitives
//==================================================================================

/// Maps a two's complement value onto sign-magnitude-like ordering so that
/// small negative numbers have few set bits. It is its own inverse.
#[inline(always)]
pub fn fold_sign<U: BitWord>(x: U, signed: bool) -> U {
    if signed && (x >> (U::WIDTH as usize - 1)) != U::zero() {
        x ^ (U::max_value() >> 1)
    } else {
        x
    }
}

/// Encode-side preprocessing: sign-fold, then rotate left by one.
#[inline(always)]
pub fn preprocess<U: BitWord>(x: U, signed: bool) -> U {
    fold_sign(x, signed).rotate_left(1)
}

/// Decode-side postprocessing: rotate right by one, then sign-fold.
#[inline(always)]
pub fn postprocess<U: BitWord>(y: U, signed: bool) -> U {
    fold_sign(y.rotate_right(1), signed)
}

/// Replaces the `n` bits of `dest` starting at bit `at` with the low `n`
/// bits of `src`. Requires `1 <= n` and `at + n <= WIDTH`.
#[inline(always)]
pub fn setbits<U: BitWord>(dest: U, src: U, at: u32, n: u32) -> U {
    let ones = (U::max_value() >> (U::WIDTH - n) as usize) << at as usize;
    (dest & !ones) | ((src << at as usize) & ones)
}

/// Writes the low `nbits` of `value` into `segment` at stream bit `bit_pos`,
/// most significant bit first.
///
/// Either `nbits` is a multiple of the word width and `bit_pos` is word
/// aligned, or the bits fall inside a single word. Power-of-two plane and
/// lane counts guarantee one of the two.
#[inline]
pub fn write_stream_bits<U: BitWord>(segment: &mut [U], bit_pos: usize, value: u128, nbits: u32) {
    let w = U::WIDTH as usize;
    let word = bit_pos / w;
    if nbits >= U::WIDTH {
        let words = (nbits / U::WIDTH) as usize;
        for (j, slot) in segment[word..word + words].iter_mut().enumerate() {
            let shift = nbits as usize - w * (j + 1);
            *slot = U::narrow(value >> shift);
        }
    } else {
        let at = U::WIDTH - (bit_pos % w) as u32 - nbits;
        segment[word] = setbits(segment[word], U::narrow(value), at, nbits);
    }
}

/// Reads `nbits` stream bits starting at `bit_pos`; the inverse of
/// `write_stream_bits` under the same alignment rules.
#[inline]
pub fn read_stream_bits<U: BitWord>(segment: &[U], bit_pos: usize, nbits: u32) -> u128 {
    let w = U::WIDTH as usize;
    let word = bit_pos / w;
    if nbits >= U::WIDTH {
        let words = (nbits / U::WIDTH) as usize;
        segment[word..word + words]
            .iter()
            .fold(0u128, |acc, &x| (acc << w) | x.widen())
    } else {
        let at = U::WIDTH - (bit_pos % w) as u32 - nbits;
        let field = (segment[word] >> at as usize).widen();
        field & ((1u128 << nbits) - 1)
    }
}

//==================================================================================
// 3. Plane Layout
//==================================================================================

/// Validated geometry of one bitplane transform for a word width and plane
/// width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Bits per element.
    pub width: u32,
    /// Bits per plane.
    pub plane_width: u32,
    /// `width / plane_width`.
    pub num_planes: usize,
}

impl PlaneLayout {
    pub fn new(width: u32, plane_width: u32) -> Result<Self, BitswapError> {
        if plane_width == 0 || plane_width > width || width % plane_width != 0 {
            return Err(BitswapError::InvalidPlaneWidth {
                plane_width,
                type_width: width,
            });
        }
        Ok(Self {
            width,
            plane_width,
            num_planes: (width / plane_width) as usize,
        })
    }

    pub fn for_word<U: BitWord>(plane_width: u32) -> Result<Self, BitswapError> {
        Self::new(U::WIDTH, plane_width)
    }

    /// Elements per segment for a buffer of `n` elements.
    pub fn segment_len(&self, n: usize) -> Result<usize, BitswapError> {
        if n % self.num_planes != 0 {
            return Err(BitswapError::SizeMismatch {
                expected_multiple: self.num_planes,
                actual: n,
            });
        }
        Ok(n / self.num_planes)
    }

    /// Largest prefix of `n` that the kernels accept.
    pub fn divisible_prefix(&self, n: usize) -> usize {
        n - n % self.num_planes
    }

    /// The P-bit field of plane `p` in `v`.
    #[inline(always)]
    pub fn field<U: BitWord>(&self, v: U, p: usize) -> U {
        let mask = U::max_value() >> (self.width - self.plane_width) as usize;
        (v >> p * self.plane_width as usize) & mask
    }

    /// Segment that receives plane `p`; plane 0 is the least significant.
    #[inline(always)]
    pub fn segment_of(&self, p: usize) -> usize {
        self.num_planes - 1 - p
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
