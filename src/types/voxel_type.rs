//! This module defines the canonical, type-safe representation of the voxel
//! element types the bitplane engine can process.

use crate::error::BitswapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The canonical, internal representation of a voxel element type.
///
/// Only fixed-width integers are listed; floating point volumes have to be
/// bit-cast to their unsigned twin before entering the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoxelType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl VoxelType {
    pub const ALL: [VoxelType; 8] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
    ];

    /// Returns the width of one element in bits.
    pub fn bit_width(&self) -> u32 {
        match self {
            Self::Int8 | Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Int32 | Self::UInt32 => 32,
            Self::Int64 | Self::UInt64 => 64,
        }
    }

    /// Returns the width of one element in bytes.
    pub fn byte_width(&self) -> usize {
        (self.bit_width() / 8) as usize
    }

    /// Returns `true` if the data type is a signed integer.
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }
}

/// Provides the canonical string representation for a `VoxelType`.
impl fmt::Display for VoxelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for VoxelType {
    type Err = BitswapError;

    /// Accepts the `Display` form (`UInt16`) as well as the short lowercase
    /// forms used on the command line of imaging tools (`uint16`, `u16`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int8" | "i8" => Ok(Self::Int8),
            "int16" | "i16" => Ok(Self::Int16),
            "int32" | "i32" => Ok(Self::Int32),
            "int64" | "i64" => Ok(Self::Int64),
            "uint8" | "u8" => Ok(Self::UInt8),
            "uint16" | "u16" => Ok(Self::UInt16),
            "uint32" | "u32" => Ok(Self::UInt32),
            "uint64" | "u64" => Ok(Self::UInt64),
            _ => Err(BitswapError::UnsupportedType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrips_through_from_str() {
        for dtype in VoxelType::ALL {
            let parsed: VoxelType = dtype.to_string().parse().unwrap();
            assert_eq!(parsed, dtype);
        }
    }

    #[test]
    fn test_widths_and_signedness() {
        assert_eq!(VoxelType::UInt16.bit_width(), 16);
        assert_eq!(VoxelType::Int64.byte_width(), 8);
        assert!(VoxelType::Int8.is_signed());
        assert!(!VoxelType::UInt32.is_signed());
    }

    #[test]
    fn test_from_str_rejects_floats() {
        let result = "Float32".parse::<VoxelType>();
        assert!(matches!(result, Err(BitswapError::UnsupportedType(_))));
    }
}
