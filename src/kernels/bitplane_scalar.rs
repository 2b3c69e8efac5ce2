//! This module contains the scalar bitplane reorder kernel.
//!
//! It is the reference implementation of the transform: every other kernel
//! in this crate is tested for byte-identical output against it.
//!
//! For an element `i` with preprocessed value `v` and plane `p`, the P-bit
//! field `(v >> p*P) & mask` goes to segment `num_planes - 1 - p`, word
//! `i / num_planes`, at bit offset `(W - P) - (i % num_planes) * P`.

use crate::error::BitswapError;
use crate::kernels::bits::{postprocess, preprocess, setbits, BitWord, PlaneLayout};
use crate::kernels::check_lengths;
use crate::traits::{as_bits, as_bits_mut, Element};

//==================================================================================
// 1. Core Logic (The "Engine")
//==================================================================================

/// Bit offset of element `i`'s field inside its destination word.
#[inline(always)]
fn field_offset(layout: &PlaneLayout, i: usize) -> u32 {
    (layout.width - layout.plane_width) - (i % layout.num_planes) as u32 * layout.plane_width
}

/// Writes the fields of one already preprocessed element into every segment
/// held by `out`. `out` starts at segment `first_segment` and holds whole
/// segments of `seg_len` words.
#[inline(always)]
pub(crate) fn write_element<U: BitWord>(
    v: U,
    i: usize,
    layout: &PlaneLayout,
    first_segment: usize,
    seg_len: usize,
    out: &mut [U],
) {
    let at = field_offset(layout, i);
    let word = i / layout.num_planes;
    for (k, segment) in out.chunks_exact_mut(seg_len).enumerate() {
        let p = layout.segment_of(first_segment + k);
        let field = layout.field(v, p);
        segment[word] = setbits(segment[word], field, at, layout.plane_width);
    }
}

/// Reassembles the preprocessed value of element `i` from all segments of a
/// full encoded buffer.
#[inline(always)]
pub(crate) fn read_element<U: BitWord>(
    encoded: &[U],
    i: usize,
    layout: &PlaneLayout,
    seg_len: usize,
) -> U {
    let at = field_offset(layout, i) as usize;
    let word = i / layout.num_planes;
    let mask = U::max_value() >> (layout.width - layout.plane_width) as usize;
    let mut v = U::zero();
    for p in 0..layout.num_planes {
        let s = layout.segment_of(p);
        let field = (encoded[s * seg_len + word] >> at) & mask;
        v = v | (field << p * layout.plane_width as usize);
    }
    v
}

/// Encodes `input` into the segments starting at `first_segment`. `out`
/// must hold a whole number of segments of `input.len() / num_planes`
/// words.
pub(crate) fn encode_segments<U: BitWord>(
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
    for (i, &x) in input.iter().enumerate() {
        write_element(preprocess(x, signed), i, layout, first_segment, seg_len, out);
    }
}

/// Decodes the elements `[first_elem, first_elem + out.len())` from a full
/// encoded buffer.
pub(crate) fn decode_range<U: BitWord>(
    encoded: &[U],
    signed: bool,
    layout: &PlaneLayout,
    first_elem: usize,
    out: &mut [U],
) {
    let seg_len = encoded.len() / layout.num_planes;
    for (j, slot) in out.iter_mut().enumerate() {
        let v = read_element(encoded, first_elem + j, layout, seg_len);
        *slot = postprocess(v, signed);
    }
}

//==================================================================================
// 2. Public API (Performant, Decoupled)
//==================================================================================

/// Reorders the bits of `input` into `output`, one segment per bitplane.
///
/// # Errors
/// * `InvalidPlaneWidth` if `plane_width` does not divide the element width.
/// * `LengthMismatch` if the slices differ in length.
/// * `SizeMismatch` if the length is not a multiple of the plane count.
pub fn encode<T: Element>(input: &[T], output: &mut [T], plane_width: u32) -> Result<(), BitswapError> {
    let layout = PlaneLayout::for_word::<T::Bits>(plane_width)?;
    check_lengths(input.len(), output.len())?;
    layout.segment_len(input.len())?;
    encode_segments(as_bits(input), T::SIGNED, &layout, 0, as_bits_mut(output));
    Ok(())
}

/// Inverse of [`encode`].
pub fn decode<T: Element>(input: &[T], output: &mut [T], plane_width: u32) -> Result<(), BitswapError> {
    let layout = PlaneLayout::for_word::<T::Bits>(plane_width)?;
    check_lengths(input.len(), output.len())?;
    layout.segment_len(input.len())?;
    decode_range(as_bits(input), T::SIGNED, &layout, 0, as_bits_mut(output));
    Ok(())
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
