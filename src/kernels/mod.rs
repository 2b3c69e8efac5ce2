//! This module collects the pure, stateless bitplane kernels and the entropy
//! sink they feed.
//!
//! Kernels operate on caller-owned typed slices and never allocate the output.
//! The dispatch between them (scalar, vector, thread count) lives in the
//! `pipeline::bitswap_stage` adapter.

use crate::error::BitswapError;

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// Scalar primitives and the segment bit-stream accessors.
pub mod bits;

/// The 128-bit register abstraction and its portable implementation.
pub mod lanes;

#[cfg(target_arch = "x86_64")]
pub mod sse2;

/// Reference bitplane reorder.
pub mod bitplane_scalar;

/// Register-at-a-time bitplane reorder.
pub mod bitplane_vector;

/// Batched encode through per-plane accumulators.
pub mod bitshuffle;

/// Final Stage: Entropy Coding
pub mod zstd;


//==================================================================================
// 2. Shared Validation
//==================================================================================

/// Input and output of every bitplane kernel hold the same number of elements.
pub(crate) fn check_lengths(input: usize, output: usize) -> Result<(), BitswapError> {
    if input != output {
        return Err(BitswapError::LengthMismatch { input, output });
    }
    Ok(())
}
