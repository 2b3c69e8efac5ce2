// In: src/pipeline/stage.rs

//! The byte-level contract every pipeline stage implements.
//!
//! A stage is either a *filter*, which keeps the byte length of its input
//! (the bitplane reorder), or a *compressor*, which may change it (zstd).
//! Stages are object safe so that a `Pipeline` can hold any mix of them.

use crate::error::BitswapError;
use crate::types::VoxelType;

/// What a stage needs to know about the buffer it is handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    /// Element type of the raw, un-encoded buffer.
    pub dtype: VoxelType,
    /// Extents of the raw array. Only the product matters to the kernels.
    pub shape: Vec<usize>,
}

impl StageContext {
    pub fn new(dtype: VoxelType, shape: Vec<usize>) -> Self {
        Self { dtype, shape }
    }

    /// A one-dimensional context covering `byte_len` bytes of `dtype`.
    pub fn flat(dtype: VoxelType, byte_len: usize) -> Self {
        Self {
            dtype,
            shape: vec![byte_len / dtype.byte_width()],
        }
    }

    pub fn num_elements(&self) -> usize {
        crate::utils::shape_len(&self.shape)
    }

    pub fn num_bytes(&self) -> usize {
        self.num_elements() * self.dtype.byte_width()
    }
}

/// One reversible transform in a pipeline.
pub trait Stage: Send + Sync + std::fmt::Debug {
    /// Stage name as it appears in a pipeline string, e.g. `bitswap4`.
    fn name(&self) -> String;

    /// The stage settings as `key=value` pairs. Feeding the result back to
    /// the factory reproduces an identical stage.
    fn config(&self) -> String;

    /// Compressors may change the byte length; filters never do.
    fn is_compressor(&self) -> bool;

    /// Upper bound on the encoded size of `input_bytes` bytes.
    fn max_encoded_size(&self, input_bytes: usize) -> usize;

    /// Appends the encoded form of `input` to `output`.
    fn encode(&self, input: &[u8], output: &mut Vec<u8>, ctx: &StageContext) -> Result<(), BitswapError>;

    /// Appends the decoded form of `input` to `output`.
    fn decode(&self, input: &[u8], output: &mut Vec<u8>, ctx: &StageContext) -> Result<(), BitswapError>;
}
