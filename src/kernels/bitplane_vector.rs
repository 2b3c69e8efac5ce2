//! This module contains the register-at-a-time bitplane reorder kernel.
//!
//! The kernel is written once against `LaneVector` and instantiated with
//! either `PortableLanes` or the SSE2 registers. Its output is byte-identical
//! to `bitplane_scalar`.
//!
//! A register of `L` lanes covers elements `[r*L, (r+1)*L)`. In every segment
//! those elements own the `L*P` stream bits starting at `r*L*P`. For each
//! segment the P-bit field of every lane is pulled out with `P` shift and
//! MSB-gather steps, packed MSB-first and written to the stream in one go.
//! `L*P` is either a whole number of words or a fraction of one word, and
//! `write_stream_bits` handles both.

use crate::error::BitswapError;
use crate::kernels::bitplane_scalar::{read_element, write_element};
use crate::kernels::bits::{
    postprocess, preprocess, read_stream_bits, write_stream_bits, BitWord, PlaneLayout,
};
use crate::kernels::check_lengths;
use crate::kernels::lanes::{LaneVector, REGISTER_BYTES};
use crate::traits::{as_bits, as_bits_mut, Element};

//==================================================================================
// 1. Field Packing
//==================================================================================

/// Packs the P-bit field of every lane of `v` destined for segment `s` into
/// the low `LANES * P` bits of the result, lane 0 first.
#[inline(always)]
pub(crate) fn pack_fields<U: BitWord, V: LaneVector<U>>(v: V, s: usize, plane_width: u32) -> u128 {
    let lanes = V::LANES as u32;
    let base = s as u32 * plane_width;
    if plane_width == 1 {
        let mask = v.shl(base).gather_msb();
        return (mask.reverse_bits() >> (32 - lanes)) as u128;
    }
    let total = lanes * plane_width;
    let mut packed = 0u128;
    for b in 0..plane_width {
        let mask = v.shl(base + b).gather_msb();
        for k in 0..lanes {
            if (mask >> k) & 1 == 1 {
                packed |= 1u128 << (total - 1 - k * plane_width - b);
            }
        }
    }
    packed
}

/// Inverse of [`pack_fields`]: returns a register whose lanes hold the
/// fields of segment `s` at their plane position and zero elsewhere.
#[inline(always)]
pub(crate) fn unpack_fields<U: BitWord, V: LaneVector<U>>(packed: u128, s: usize, plane_width: u32) -> V {
    let lanes = V::LANES as u32;
    let base = s as u32 * plane_width;
    if plane_width == 1 {
        let mask = ((packed as u32) << (32 - lanes)).reverse_bits();
        return V::scatter_msb(mask).shr(base);
    }
    let total = lanes * plane_width;
    let mut acc = V::zero();
    for b in 0..plane_width {
        let mut mask = 0u32;
        for k in 0..lanes {
            if (packed >> (total - 1 - k * plane_width - b)) & 1 == 1 {
                mask |= 1 << k;
            }
        }
        acc = acc.or(V::scatter_msb(mask).shr(base + b));
    }
    acc
}

//==================================================================================
// 2. Core Logic (The "Engine")
//==================================================================================

/// Encodes `input` into the segments starting at `first_segment`. Elements
/// past the last full register go through the scalar element writer.
pub(crate) fn encode_segments<U: BitWord, V: LaneVector<U>>(
    input: &[U],
    signed: bool,
    layout: &PlaneLayout,
    first_segment: usize,
    out: &mut [U],
) {
    let seg_len = input.len() / layout.num_planes;
    if seg_len == 0 {
        return;
    }
    let lanes = V::LANES;
    let nbits = lanes as u32 * layout.plane_width;
    let full = input.len() / lanes;

    for (r, chunk) in input.chunks_exact(lanes).enumerate() {
        let v = V::load(chunk).preprocess(signed);
        let bit_pos = r * nbits as usize;
        for (k, segment) in out.chunks_exact_mut(seg_len).enumerate() {
            let packed = pack_fields::<U, V>(v, first_segment + k, layout.plane_width);
            write_stream_bits(segment, bit_pos, packed, nbits);
        }
    }

    for (i, &x) in input.iter().enumerate().skip(full * lanes) {
        write_element(preprocess(x, signed), i, layout, first_segment, seg_len, out);
    }
}

/// Decodes elements `[first_elem, first_elem + out.len())` of a full encoded
/// buffer. `first_elem` must be a multiple of `num_planes`, which keeps every
/// register on the stream alignment `write_stream_bits` expects.
pub(crate) fn decode_range<U: BitWord, V: LaneVector<U>>(
    encoded: &[U],
    signed: bool,
    layout: &PlaneLayout,
    first_elem: usize,
    out: &mut [U],
) {
    debug_assert_eq!(first_elem % layout.num_planes, 0);
    let seg_len = encoded.len() / layout.num_planes;
    if seg_len == 0 {
        return;
    }
    let lanes = V::LANES;
    let nbits = lanes as u32 * layout.plane_width;
    let full = out.len() / lanes;

    for (r, chunk) in out.chunks_exact_mut(lanes).enumerate() {
        let bit_pos = (first_elem + r * lanes) * layout.plane_width as usize;
        let mut acc = V::zero();
        for (s, segment) in encoded.chunks_exact(seg_len).enumerate() {
            let packed = read_stream_bits(segment, bit_pos, nbits);
            acc = acc.or(unpack_fields::<U, V>(packed, s, layout.plane_width));
        }
        acc.postprocess(signed).store(chunk);
    }

    for (j, slot) in out.iter_mut().enumerate().skip(full * lanes) {
        let v = read_element(encoded, first_elem + j, layout, seg_len);
        *slot = postprocess(v, signed);
    }
}

/// The vector path needs at least one full register of input.
pub(crate) fn check_register(bytes: usize) -> Result<(), BitswapError> {
    if bytes < REGISTER_BYTES {
        return Err(BitswapError::RegisterUnderflow {
            required: REGISTER_BYTES,
            available: bytes,
        });
    }
    Ok(())
}

//==================================================================================
// 3. Public API
//==================================================================================

/// Reorders the bits of `input` into `output` using registers of type `V`.
///
/// # Errors
/// Same as `bitplane_scalar::encode`, plus `RegisterUnderflow` when the
/// input is smaller than one 128-bit register.
pub fn encode<T, V>(input: &[T], output: &mut [T], plane_width: u32) -> Result<(), BitswapError>
where
    T: Element,
    V: LaneVector<T::Bits>,
{
    let layout = PlaneLayout::for_word::<T::Bits>(plane_width)?;
    check_lengths(input.len(), output.len())?;
    layout.segment_len(input.len())?;
    check_register(std::mem::size_of_val(input))?;
    encode_segments::<T::Bits, V>(as_bits(input), T::SIGNED, &layout, 0, as_bits_mut(output));
    Ok(())
}

/// Inverse of [`encode`].
pub fn decode<T, V>(input: &[T], output: &mut [T], plane_width: u32) -> Result<(), BitswapError>
where
    T: Element,
    V: LaneVector<T::Bits>,
{
    let layout = PlaneLayout::for_word::<T::Bits>(plane_width)?;
    check_lengths(input.len(), output.len())?;
    layout.segment_len(input.len())?;
    check_register(std::mem::size_of_val(input))?;
    decode_range::<T::Bits, V>(as_bits(input), T::SIGNED, &layout, 0, as_bits_mut(output));
    Ok(())
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::lanes::PortableLanes;

    type P16 = PortableLanes<u16, 8>;
    type P8 = PortableLanes<u8, 16>;

    #[test]
    fn test_pack_fields_one_bit_is_lane_ordered() {
        // Lane k has only its top bit set for even k.
        let v = P16::load(&[0x8000, 0, 0x8000, 0, 0x8000, 0, 0x8000, 0]);
        assert_eq!(pack_fields::<u16, P16>(v, 0, 1), 0b1010_1010);
    }

    #[test]
    fn test_pack_unpack_inverse() {
        let src: Vec<u8> = (0..16).map(|x| (x * 37 + 11) as u8).collect();
        let v = P8::load(&src);
        for p in [1u32, 2, 4, 8] {
            let planes = 8 / p as usize;
            let mut acc = P8::zero();
            for s in 0..planes {
                let packed = pack_fields::<u8, P8>(v, s, p);
                acc = acc.or(unpack_fields::<u8, P8>(packed, s, p));
            }
            assert_eq!(acc.0.to_vec(), src, "plane width {}", p);
        }
    }

    #[test]
    fn test_ramp_fixture_one_bit_planes() {
        let input: Vec<u16> = (0..16).collect();
        let mut out = vec![0u16; 16];
        encode::<u16, P16>(&input, &mut out, 1).unwrap();
        let mut expected = vec![0u16; 16];
        expected[11] = 0xff;
        expected[12] = 0x0f0f;
        expected[13] = 0x3333;
        expected[14] = 0x5555;
        assert_eq!(out, expected);
    }

    #[test]
    fn test_register_underflow() {
        let input = [1u32, 2];
        let mut out = [0u32; 2];
        let err = encode::<u32, PortableLanes<u32, 4>>(&input, &mut out, 16).unwrap_err();
        assert!(matches!(
            err,
            BitswapError::RegisterUnderflow {
                required: 16,
                available: 8
            }
        ));
    }

    #[test]
    fn test_tail_shorter_than_register_roundtrips() {
        // 8 planes of one byte each; 24 elements leave an 8-element tail.
        let input: Vec<i8> = (0..24).map(|x| (x as i8).wrapping_mul(-7)).collect();
        let mut enc = vec![0i8; 24];
        let mut dec = vec![0i8; 24];
        encode::<i8, P8>(&input, &mut enc, 1).unwrap();
        decode::<i8, P8>(&enc, &mut dec, 1).unwrap();
        assert_eq!(dec, input);
    }
}
