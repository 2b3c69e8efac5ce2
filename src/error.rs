// In: src/error.rs

//! This module defines the single, unified error type for the entire bitswap library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

/// Status code returned by the C ABI on success.
pub const STATUS_SUCCESS: i32 = 0;

#[derive(Error, Debug)]
pub enum BitswapError {
    // =========================================================================
    // === Configuration Errors (fatal, reported at construction time)
    // =========================================================================
    #[error("Plane width {plane_width} is not a divisor of the {type_width}-bit element width")]
    InvalidPlaneWidth { plane_width: u32, type_width: u32 },

    #[error("Thread count must be between 1 and 256, got {0}")]
    InvalidThreadCount(i64),

    #[error("Invalid stage configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // === Buffer Shape Errors
    // =========================================================================
    #[error("Buffer length mismatch: expected a multiple of {expected_multiple}, got {actual}")]
    SizeMismatch {
        expected_multiple: usize,
        actual: usize,
    },

    #[error("Input holds {input} elements but output holds {output}")]
    LengthMismatch { input: usize, output: usize },

    #[error("Vector path needs at least {required} bytes, got {available}")]
    RegisterUnderflow { required: usize, available: usize },

    #[error("Null pointer passed across the C boundary")]
    NullPointer,

    #[error("Pointer is not aligned to {0} bytes")]
    Misaligned(usize),

    // =========================================================================
    // === Pipeline Errors
    // =========================================================================
    #[error("Unknown pipeline stage: {0}")]
    UnknownStage(String),

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Pipeline execution failed at stage '{stage}': {source}")]
    PipelineError {
        stage: String,
        #[source]
        source: Box<BitswapError>,
    },

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),

    #[error("Thread pool construction failed: {0}")]
    ThreadPool(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during descriptor serialization.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // bytemuck::PodCastError doesn't impl Error
}

impl BitswapError {
    /// Maps the error onto the integer status codes of the C ABI.
    /// `0` is reserved for success and never returned here.
    pub fn status_code(&self) -> i32 {
        match self {
            BitswapError::InvalidPlaneWidth { .. } => 2,
            BitswapError::InvalidThreadCount(_) => 3,
            BitswapError::InvalidConfig(_) => 4,
            BitswapError::SizeMismatch { .. } => 5,
            BitswapError::LengthMismatch { .. } => 6,
            BitswapError::RegisterUnderflow { .. } => 7,
            BitswapError::NullPointer => 8,
            BitswapError::Misaligned(_) => 9,
            BitswapError::PipelineError { source, .. } => source.status_code(),
            _ => 1,
        }
    }

    /// Wraps `self` with the name of the stage that produced it.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        BitswapError::PipelineError {
            stage: stage.into(),
            source: Box::new(self),
        }
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for BitswapError {
    fn from(err: bytemuck::PodCastError) -> Self {
        BitswapError::PodCast(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for BitswapError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        BitswapError::ThreadPool(err.to_string())
    }
}
