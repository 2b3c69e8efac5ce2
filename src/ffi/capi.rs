//! The C ABI of the bitplane reorder.
//!
//! Every exported function has the shape
//! `SQY_BitSwap<P><Encode|Decode>_<TYPE>(src, dst, length) -> int`, matching
//! the symbols declared in `sqeazy.h`. `length` is the size of both buffers
//! in **bytes**. The return value is `0` on success and one of the
//! `BitswapError::status_code` values otherwise.
//!
//! Buffers that are not aligned for the element type are processed through
//! an aligned scratch copy. Overlapping `src` and `dst` are allowed.

use std::borrow::Cow;
use std::os::raw::{c_char, c_int, c_long};

use crate::config::BitswapConfig;
use crate::error::{BitswapError, STATUS_SUCCESS};
use crate::pipeline::bitswap_stage::{typed_view, BitswapStage};
use crate::traits::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encode,
    Decode,
}

/// Runs one transform over raw caller memory.
///
/// # Safety
/// `src` and `dst` must each be valid for `length` bytes of reads and writes
/// respectively.
unsafe fn run_raw<T: Element>(
    direction: Direction,
    plane_width: u32,
    src: *const c_char,
    dst: *mut c_char,
    length: c_long,
) -> Result<(), BitswapError> {
    if src.is_null() || dst.is_null() {
        return Err(BitswapError::NullPointer);
    }
    let bytes = usize::try_from(length)
        .map_err(|_| BitswapError::InvalidConfig(format!("negative buffer length {}", length)))?;
    let size = std::mem::size_of::<T>();
    if bytes % size != 0 {
        return Err(BitswapError::SizeMismatch {
            expected_multiple: size,
            actual: bytes,
        });
    }
    let n = bytes / size;
    let stage = BitswapStage::new(BitswapConfig::new(plane_width))?;

    let src_start = src as usize;
    let dst_start = dst as usize;
    let overlapping = src_start < dst_start + bytes && dst_start < src_start + bytes;

    // The input is copied out first whenever it shares memory with the output.
    let src_bytes = std::slice::from_raw_parts(src as *const u8, bytes);
    let input: Cow<'_, [T]> = if overlapping {
        Cow::Owned(bytemuck::pod_collect_to_vec(src_bytes))
    } else {
        typed_view::<T>(src_bytes)?
    };

    let dst_bytes = std::slice::from_raw_parts_mut(dst as *mut u8, bytes);
    match bytemuck::try_cast_slice_mut::<u8, T>(dst_bytes) {
        Ok(out) => run_typed(&stage, direction, &input, out, n),
        Err(_) => {
            let mut scratch = vec![T::zeroed(); n];
            run_typed(&stage, direction, &input, &mut scratch, n)?;
            dst_bytes.copy_from_slice(bytemuck::cast_slice(&scratch));
            Ok(())
        }
    }
}

fn run_typed<T: Element>(
    stage: &BitswapStage,
    direction: Direction,
    input: &[T],
    output: &mut [T],
    n: usize,
) -> Result<(), BitswapError> {
    match direction {
        Direction::Encode => stage.encode(input, output, &[n]).map(|_| ()),
        Direction::Decode => stage.decode(input, output, &[n]),
    }
}

fn status(result: Result<(), BitswapError>) -> c_int {
    match result {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => {
            log::error!("bitswap C call failed: {}", e);
            e.status_code()
        }
    }
}

macro_rules! export_bitswap {
    ($encode:ident, $decode:ident, $T:ty, $plane_width:expr) => {
        /// # Safety
        /// `src` and `dst` must be valid for `length` bytes.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn $encode(src: *const c_char, dst: *mut c_char, length: c_long) -> c_int {
            status(run_raw::<$T>(Direction::Encode, $plane_width, src, dst, length))
        }

        /// # Safety
        /// `src` and `dst` must be valid for `length` bytes.
        #[no_mangle]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn $decode(src: *const c_char, dst: *mut c_char, length: c_long) -> c_int {
            status(run_raw::<$T>(Direction::Decode, $plane_width, src, dst, length))
        }
    };
}

export_bitswap!(SQY_BitSwap1Encode_UI8, SQY_BitSwap1Decode_UI8, u8, 1);
export_bitswap!(SQY_BitSwap1Encode_I8, SQY_BitSwap1Decode_I8, i8, 1);
export_bitswap!(SQY_BitSwap1Encode_UI16, SQY_BitSwap1Decode_UI16, u16, 1);
export_bitswap!(SQY_BitSwap1Encode_I16, SQY_BitSwap1Decode_I16, i16, 1);

export_bitswap!(SQY_BitSwap2Encode_UI8, SQY_BitSwap2Decode_UI8, u8, 2);
export_bitswap!(SQY_BitSwap2Encode_I8, SQY_BitSwap2Decode_I8, i8, 2);
export_bitswap!(SQY_BitSwap2Encode_UI16, SQY_BitSwap2Decode_UI16, u16, 2);
export_bitswap!(SQY_BitSwap2Encode_I16, SQY_BitSwap2Decode_I16, i16, 2);

export_bitswap!(SQY_BitSwap4Encode_UI8, SQY_BitSwap4Decode_UI8, u8, 4);
export_bitswap!(SQY_BitSwap4Encode_I8, SQY_BitSwap4Decode_I8, i8, 4);
export_bitswap!(SQY_BitSwap4Encode_UI16, SQY_BitSwap4Decode_UI16, u16, 4);
export_bitswap!(SQY_BitSwap4Encode_I16, SQY_BitSwap4Decode_I16, i16, 4);

export_bitswap!(SQY_BitSwap8Encode_UI8, SQY_BitSwap8Decode_UI8, u8, 8);
export_bitswap!(SQY_BitSwap8Encode_I8, SQY_BitSwap8Decode_I8, i8, 8);
export_bitswap!(SQY_BitSwap8Encode_UI16, SQY_BitSwap8Decode_UI16, u16, 8);
export_bitswap!(SQY_BitSwap8Encode_I16, SQY_BitSwap8Decode_I16, i16, 8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::bitplane_scalar;

    #[test]
    fn test_c_roundtrip_u16() {
        let input: Vec<u16> = (0..16).collect();
        let mut enc = vec![0u16; 16];
        let mut dec = vec![0u16; 16];
        let rc = unsafe {
            SQY_BitSwap1Encode_UI16(input.as_ptr() as *const c_char, enc.as_mut_ptr() as *mut c_char, 32)
        };
        assert_eq!(rc, 0);
        assert_eq!(enc[11], 0xff);
        assert_eq!(enc[14], 0x5555);
        let rc = unsafe {
            SQY_BitSwap1Decode_UI16(enc.as_ptr() as *const c_char, dec.as_mut_ptr() as *mut c_char, 32)
        };
        assert_eq!(rc, 0);
        assert_eq!(dec, input);
    }

    type CFn = unsafe extern "C" fn(*const c_char, *mut c_char, c_long) -> c_int;

    #[test]
    fn test_c_every_symbol_roundtrips() {
        let table: [(CFn, CFn, usize); 16] = [
            (SQY_BitSwap1Encode_UI8, SQY_BitSwap1Decode_UI8, 1),
            (SQY_BitSwap1Encode_I8, SQY_BitSwap1Decode_I8, 1),
            (SQY_BitSwap1Encode_UI16, SQY_BitSwap1Decode_UI16, 2),
            (SQY_BitSwap1Encode_I16, SQY_BitSwap1Decode_I16, 2),
            (SQY_BitSwap2Encode_UI8, SQY_BitSwap2Decode_UI8, 1),
            (SQY_BitSwap2Encode_I8, SQY_BitSwap2Decode_I8, 1),
            (SQY_BitSwap2Encode_UI16, SQY_BitSwap2Decode_UI16, 2),
            (SQY_BitSwap2Encode_I16, SQY_BitSwap2Decode_I16, 2),
            (SQY_BitSwap4Encode_UI8, SQY_BitSwap4Decode_UI8, 1),
            (SQY_BitSwap4Encode_I8, SQY_BitSwap4Decode_I8, 1),
            (SQY_BitSwap4Encode_UI16, SQY_BitSwap4Decode_UI16, 2),
            (SQY_BitSwap4Encode_I16, SQY_BitSwap4Decode_I16, 2),
            (SQY_BitSwap8Encode_UI8, SQY_BitSwap8Decode_UI8, 1),
            (SQY_BitSwap8Encode_I8, SQY_BitSwap8Decode_I8, 1),
            (SQY_BitSwap8Encode_UI16, SQY_BitSwap8Decode_UI16, 2),
            (SQY_BitSwap8Encode_I16, SQY_BitSwap8Decode_I16, 2),
        ];
        // 1024 bytes is a whole number of elements and planes for every entry.
        let raw: Vec<u16> = (0..512u16).map(|x| x.wrapping_mul(31_337) ^ 0x5a5a).collect();
        let src: &[u8] = bytemuck::cast_slice(&raw);
        for (i, &(encode, decode, width)) in table.iter().enumerate() {
            let mut enc = vec![0u16; raw.len()];
            let mut dec = vec![0u16; raw.len()];
            let len = src.len() as c_long;
            unsafe {
                assert_eq!(encode(src.as_ptr() as *const c_char, enc.as_mut_ptr() as *mut c_char, len), 0);
                assert_eq!(decode(enc.as_ptr() as *const c_char, dec.as_mut_ptr() as *mut c_char, len), 0);
            }
            assert_eq!(dec, raw, "entry {} ({}-byte elements)", i, width);
        }
    }

    #[test]
    fn test_c_misaligned_buffers() {
        let values: Vec<i16> = (-40..40).collect();
        let mut expected = vec![0i16; values.len()];
        bitplane_scalar::encode(&values, &mut expected, 4).unwrap();

        let len = values.len() * 2;
        let mut src = vec![0u8; len + 1];
        src[1..].copy_from_slice(bytemuck::cast_slice(&values));
        let mut dst = vec![0u8; len + 1];
        let rc = unsafe {
            SQY_BitSwap4Encode_I16(
                src[1..].as_ptr() as *const c_char,
                dst[1..].as_mut_ptr() as *mut c_char,
                len as c_long,
            )
        };
        assert_eq!(rc, 0);
        assert_eq!(&dst[1..], bytemuck::cast_slice::<i16, u8>(&expected));
    }

    #[test]
    fn test_c_in_place() {
        let original: Vec<i8> = (-64..64).collect();
        let mut buf = original.clone();
        let ptr = buf.as_mut_ptr() as *mut c_char;
        unsafe {
            assert_eq!(SQY_BitSwap2Encode_I8(ptr, ptr, 128), 0);
            assert_eq!(SQY_BitSwap2Decode_I8(ptr, ptr, 128), 0);
        }
        assert_eq!(buf, original);
    }

    #[test]
    fn test_c_error_codes() {
        let buf = [0u8; 16];
        let mut out = [0u8; 16];
        unsafe {
            assert_eq!(
                SQY_BitSwap1Encode_UI8(std::ptr::null(), out.as_mut_ptr() as *mut c_char, 16),
                BitswapError::NullPointer.status_code()
            );
            assert_eq!(
                SQY_BitSwap1Encode_UI16(buf.as_ptr() as *const c_char, out.as_mut_ptr() as *mut c_char, 15),
                5
            );
            assert_eq!(
                SQY_BitSwap8Encode_UI8(buf.as_ptr() as *const c_char, out.as_mut_ptr() as *mut c_char, 0),
                0
            );
        }
    }
}
