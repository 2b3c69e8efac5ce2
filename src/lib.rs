//! This file is the root of the `bitswap` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of our library (`pipeline`, `kernels`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types most callers need.
//!
//! The C entry points (`SQY_BitSwap1Encode_UI16` and friends) live in `ffi::capi`
//! and are exported from the `cdylib` build.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod config;
pub mod detect;
pub mod error;
pub mod ffi;
pub mod kernels;
pub mod pipeline;
pub mod traits;
pub mod types;
pub mod utils;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use config::{BitswapConfig, Vectorisation, ZstdConfig};
pub use error::BitswapError;
pub use observability::enable_verbose_logging;
pub use pipeline::{BitswapStage, Pipeline, Stage, StageContext, ZstdStage};
pub use traits::Element;
pub use types::VoxelType;
