//! Batched bitplane encode through per-plane 128-bit accumulators.
//!
//! One batch is `LANES * num_planes` elements: exactly enough registers to
//! fill 128 bits in every segment. The accumulators are flushed as `LANES`
//! whole words per segment, so a batch never touches a word shared with its
//! neighbours. The output is byte-identical to `bitplane_scalar::encode`.

use std::marker::PhantomData;

use crate::error::BitswapError;
use crate::kernels::bitplane_vector::pack_fields;
use crate::kernels::bits::{BitWord, PlaneLayout};
use crate::kernels::check_lengths;
use crate::kernels::lanes::LaneVector;
use crate::traits::{as_bits, as_bits_mut, Element};

const ACC_BITS: u32 = 128;

/// Per-plane bit accumulator.
#[derive(Debug, Clone)]
pub struct BitShuffle<U: BitWord, V: LaneVector<U> = <U as BitWord>::Portable> {
    layout: PlaneLayout,
    signed: bool,
    /// One accumulator per segment, filled from the most significant bit.
    acc: Vec<u128>,
    /// Bits already held by every accumulator.
    filled: u32,
    _lanes: PhantomData<(U, V)>,
}

impl<U: BitWord, V: LaneVector<U>> BitShuffle<U, V> {
    pub fn new(plane_width: u32, signed: bool) -> Result<Self, BitswapError> {
        let layout = PlaneLayout::for_word::<U>(plane_width)?;
        Ok(Self {
            layout,
            signed,
            acc: vec![0; layout.num_planes],
            filled: 0,
            _lanes: PhantomData,
        })
    }

    /// Elements needed to fill every accumulator once.
    pub fn batch_len(&self) -> usize {
        V::LANES * self.layout.num_planes
    }

    pub fn is_full(&self) -> bool {
        self.filled == ACC_BITS
    }

    /// Preprocesses and ingests whole registers from `input` until every
    /// accumulator is full or fewer than `LANES` elements remain. Returns
    /// the number of elements consumed.
    pub fn consume(&mut self, input: &[U]) -> usize {
        let lanes = V::LANES;
        let nbits = lanes as u32 * self.layout.plane_width;
        let mut consumed = 0;
        for chunk in input.chunks_exact(lanes) {
            if self.filled + nbits > ACC_BITS {
                break;
            }
            let v = V::load(chunk).preprocess(self.signed);
            let shift = ACC_BITS - self.filled - nbits;
            for (s, acc) in self.acc.iter_mut().enumerate() {
                *acc |= pack_fields::<U, V>(v, s, self.layout.plane_width) << shift;
            }
            self.filled += nbits;
            consumed += lanes;
        }
        consumed
    }

    /// Flushes the accumulated words into `out`, treated as `num_planes`
    /// segments, starting at element `offset` of every segment.
    ///
    /// A partially filled last word is written with its unfilled bits zero.
    pub fn write_segments(&self, out: &mut [U], offset: usize) -> Result<(), BitswapError> {
        let seg_len = self.layout.segment_len(out.len())?;
        let words = self.filled.div_ceil(U::WIDTH) as usize;
        if words == 0 {
            return Ok(());
        }
        if offset + words > seg_len {
            return Err(BitswapError::SizeMismatch {
                expected_multiple: self.batch_len(),
                actual: out.len(),
            });
        }
        for (acc, segment) in self.acc.iter().zip(out.chunks_exact_mut(seg_len)) {
            for (j, slot) in segment[offset..offset + words].iter_mut().enumerate() {
                let shift = ACC_BITS - U::WIDTH * (j as u32 + 1);
                *slot = U::narrow(acc >> shift);
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.acc.iter_mut().for_each(|a| *a = 0);
        self.filled = 0;
    }
}

/// Encodes already-unsigned words one batch at a time into all segments of
/// `out`. Shared by [`encode_batched`] and the stage adapter.
pub(crate) fn encode_words<U: BitWord, V: LaneVector<U>>(
    input: &[U],
    signed: bool,
    plane_width: u32,
    out: &mut [U],
) -> Result<(), BitswapError> {
    let mut shuffle = BitShuffle::<U, V>::new(plane_width, signed)?;
    check_lengths(input.len(), out.len())?;
    let batch = shuffle.batch_len();
    if input.len() % batch != 0 {
        return Err(BitswapError::SizeMismatch {
            expected_multiple: batch,
            actual: input.len(),
        });
    }

    for (b, chunk) in input.chunks_exact(batch).enumerate() {
        shuffle.reset();
        let consumed = shuffle.consume(chunk);
        if consumed != batch {
            return Err(BitswapError::InternalError(format!(
                "bit shuffle consumed {} of {} elements",
                consumed, batch
            )));
        }
        shuffle.write_segments(out, b * V::LANES)?;
    }
    Ok(())
}

/// Encodes a whole buffer one batch at a time.
///
/// # Errors
/// `SizeMismatch` unless the length is a multiple of `LANES * num_planes`.
pub fn encode_batched<T, V>(input: &[T], output: &mut [T], plane_width: u32) -> Result<(), BitswapError>
where
    T: Element,
    V: LaneVector<T::Bits>,
{
    encode_words::<T::Bits, V>(as_bits(input), T::SIGNED, plane_width, as_bits_mut(output))
}
