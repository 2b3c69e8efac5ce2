//! This module defines the core, strongly-typed data representations used
//! throughout the bitswap pipeline.
//!
//! It currently includes the canonical `VoxelType` enum which is the runtime
//! tag for the element type of a byte buffer travelling between stages.

pub mod voxel_type;

// Re-export the main type(s) for easier access.
pub use voxel_type::VoxelType;
