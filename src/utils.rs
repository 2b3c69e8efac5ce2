//! This module provides a set of shared, low-level utility functions used
//! throughout the bitswap core.
//!
//! Its primary responsibilities include:
//! 1.  Providing safe, validated conversions between raw byte slices and typed slices.
//! 2.  Reducing an array shape to its element count.
//! 3.  Running a closure on a sized `rayon` pool.

use bytemuck::PodCastError;
use rayon::ThreadPool;

use crate::error::BitswapError;

//==================================================================================
// 1. Byte/Typed Conversions
//==================================================================================

/// Safely reinterprets a byte slice as a slice of a plain-old-data type.
///
/// # Errors
/// Returns `Misaligned` if the slice is not aligned for `T`, and `PodCast`
/// if the length is not a multiple of `size_of::<T>()`.
pub fn safe_bytes_to_typed_slice<T: bytemuck::Pod>(bytes: &[u8]) -> Result<&[T], BitswapError> {
    bytemuck::try_cast_slice(bytes).map_err(|e| match e {
        PodCastError::TargetAlignmentGreaterAndInputNotAligned => {
            BitswapError::Misaligned(std::mem::align_of::<T>())
        }
        other => BitswapError::from(other),
    })
}

/// Copies a byte slice into a freshly allocated, correctly aligned typed vector.
/// Used whenever a zero-copy view fails on alignment.
pub fn bytes_to_typed_vec<T: bytemuck::Pod>(bytes: &[u8]) -> Result<Vec<T>, BitswapError> {
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(BitswapError::SizeMismatch {
            expected_multiple: size,
            actual: bytes.len(),
        });
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Views a typed slice as raw bytes.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}

//==================================================================================
// 2. Shapes
//==================================================================================

/// Number of elements in an array of the given shape. An empty shape is a
/// scalar and holds one element.
pub fn shape_len(shape: &[usize]) -> usize {
    shape.iter().product()
}

//==================================================================================
// 3. Thread Pools
//==================================================================================

/// Builds a pool of exactly `n_threads` workers.
pub fn build_pool(n_threads: usize) -> Result<ThreadPool, BitswapError> {
    if n_threads == 0 {
        return Err(BitswapError::InvalidThreadCount(0));
    }
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("bitswap-{}", i))
        .build()?)
}

/// Runs `op` on the calling thread when `n_threads == 1`, otherwise inside
/// a fresh pool of `n_threads` workers.
pub fn run_with_threads<R, F>(n_threads: usize, op: F) -> Result<R, BitswapError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if n_threads == 1 {
        return Ok(op());
    }
    let pool = build_pool(n_threads)?;
    Ok(pool.install(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_typed_vec_handles_any_offset() {
        let bytes: Vec<u8> = (0..9).collect();
        let typed: Vec<u16> = bytes_to_typed_vec(&bytes[1..]).unwrap();
        assert_eq!(typed.len(), 4);
        assert_eq!(typed[0], u16::from_ne_bytes([1, 2]));
        assert!(bytes_to_typed_vec::<u32>(&bytes[..7]).is_err());
    }

    #[test]
    fn test_misaligned_view_is_reported() {
        let bytes = vec![0u64; 2];
        let raw: &[u8] = bytemuck::cast_slice(&bytes);
        assert!(matches!(
            safe_bytes_to_typed_slice::<u32>(&raw[1..9]),
            Err(BitswapError::Misaligned(4))
        ));
    }

    #[test]
    fn test_typed_roundtrip() {
        let data = vec![1u32, 2, 3];
        let bytes = typed_slice_to_bytes(&data);
        let back: &[u32] = safe_bytes_to_typed_slice(bytes).unwrap();
        assert_eq!(back, &data[..]);
    }

    #[test]
    fn test_shape_len() {
        assert_eq!(shape_len(&[4, 5, 6]), 120);
        assert_eq!(shape_len(&[]), 1);
        assert_eq!(shape_len(&[3, 0]), 0);
    }

    #[test]
    fn test_run_with_threads() {
        assert_eq!(run_with_threads(1, || 7).unwrap(), 7);
        let n = run_with_threads(3, rayon::current_num_threads).unwrap();
        assert_eq!(n, 3);
        assert!(matches!(
            run_with_threads(0, || ()),
            Err(BitswapError::InvalidThreadCount(0))
        ));
    }
}
