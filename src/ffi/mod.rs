//! Foreign-function boundaries of the crate.
//!
//! `capi` exports the fixed `BitSwap<P><Encode|Decode>_<TYPE>` symbols for C
//! callers.

pub mod capi;
