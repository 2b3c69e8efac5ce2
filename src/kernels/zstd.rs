//! This module contains the pure, stateless kernels for Zstandard compression
//! and decompression.
//!
//! It is the entropy sink at the end of a bitswap pipeline. The bitplane
//! stages only reorder bits; this is where the buffer actually shrinks.
//! The frame is prefixed with the uncompressed length as a little-endian
//! `u64` so that decode can verify it.

use crate::error::BitswapError;

/// Size of the uncompressed-length prefix.
pub const HEADER_LEN: usize = 8;

/// Upper bound on the up-front reservation, as a multiple of the compressed
/// size. The header is untrusted; larger outputs grow the buffer as they go.
const MAX_RESERVE_RATIO: usize = 64;

//==================================================================================
// 1. Public API
//==================================================================================

/// Upper bound on the output of [`encode`] for `len` input bytes.
pub fn max_encoded_len(len: usize) -> usize {
    HEADER_LEN + zstd::zstd_safe::compress_bound(len)
}

/// Compresses `input_bytes`, appending the header and one zstd frame to
/// `output_buf`. Empty input produces empty output.
pub fn encode(input_bytes: &[u8], output_buf: &mut Vec<u8>, level: i32) -> Result<(), BitswapError> {
    if input_bytes.is_empty() {
        return Ok(());
    }

    let uncompressed_len: u64 = input_bytes.len() as u64;
    output_buf.extend_from_slice(&uncompressed_len.to_le_bytes());

    let mut encoder = zstd::stream::Encoder::new(output_buf, level)
        .map_err(|e| BitswapError::ZstdError(e.to_string()))?;
    std::io::Write::write_all(&mut encoder, input_bytes)
        .map_err(|e| BitswapError::ZstdError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| BitswapError::ZstdError(e.to_string()))?;

    Ok(())
}

/// Decompresses a buffer produced by [`encode`], appending to `output_buf`.
pub fn decode(input_bytes: &[u8], output_buf: &mut Vec<u8>) -> Result<(), BitswapError> {
    if input_bytes.is_empty() {
        return Ok(());
    }

    if input_bytes.len() < HEADER_LEN {
        return Err(BitswapError::ZstdError(
            "Input stream too short to contain size header.".to_string(),
        ));
    }
    let (header, compressed_data) = input_bytes.split_at(HEADER_LEN);
    let mut len_bytes = [0u8; HEADER_LEN];
    len_bytes.copy_from_slice(header);
    let recorded = u64::from_le_bytes(len_bytes);
    let uncompressed_len = usize::try_from(recorded).map_err(|_| {
        BitswapError::ZstdError(format!("Size header {} does not fit in memory.", recorded))
    })?;

    let start = output_buf.len();
    output_buf.reserve(uncompressed_len.min(compressed_data.len().saturating_mul(MAX_RESERVE_RATIO)));
    zstd::stream::copy_decode(compressed_data, &mut *output_buf)
        .map_err(|e| BitswapError::ZstdError(e.to_string()))?;

    let produced = output_buf.len() - start;
    if produced != uncompressed_len {
        return Err(BitswapError::ZstdError(format!(
            "Decompressed size does not match header. Expected {}, got {}.",
            uncompressed_len, produced
        )));
    }

    log::debug!("zstd decode: {} -> {} bytes", input_bytes.len(), produced);
    Ok(())
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
