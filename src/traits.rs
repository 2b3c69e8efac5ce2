//! This module defines the shared element traits used across the kernels.
//!
//! Every public element type is routed through its unsigned twin of the same
//! width. Signedness survives only as the `SIGNED` flag, which switches the
//! sign-fold on.

use crate::kernels::bits::BitWord;
use crate::types::VoxelType;

/// A trait that maps an integer type to the unsigned type of the same width.
pub trait HasUnsigned {
    type Unsigned;
}

// Both halves of a pair map onto the unsigned type.
macro_rules! impl_signed_unsigned_pair {
    ($S:ty, $U:ty) => {
        impl HasUnsigned for $S {
            type Unsigned = $U;
        }
        impl HasUnsigned for $U {
            type Unsigned = $U;
        }
    };
}

impl_signed_unsigned_pair!(i8, u8);
impl_signed_unsigned_pair!(i16, u16);
impl_signed_unsigned_pair!(i32, u32);
impl_signed_unsigned_pair!(i64, u64);

/// A voxel element the bitplane transforms accept.
///
/// `Bits` is the unsigned twin; slices of `Self` are reinterpreted as slices
/// of `Bits` with `bytemuck`, so both must be `Pod` and of identical layout.
pub trait Element: HasUnsigned + bytemuck::Pod + Send + Sync + 'static {
    type Bits: BitWord;
    const SIGNED: bool;
    const VOXEL_TYPE: VoxelType;
}

macro_rules! impl_element {
    ($T:ty, $signed:expr, $tag:ident) => {
        impl Element for $T {
            type Bits = <$T as HasUnsigned>::Unsigned;
            const SIGNED: bool = $signed;
            const VOXEL_TYPE: VoxelType = VoxelType::$tag;
        }
    };
}

impl_element!(u8, false, UInt8);
impl_element!(i8, true, Int8);
impl_element!(u16, false, UInt16);
impl_element!(i16, true, Int16);
impl_element!(u32, false, UInt32);
impl_element!(i32, true, Int32);
impl_element!(u64, false, UInt64);
impl_element!(i64, true, Int64);

/// Reinterprets a typed slice as its unsigned twin.
pub fn as_bits<T: Element>(data: &[T]) -> &[T::Bits] {
    bytemuck::cast_slice(data)
}

/// Reinterprets a mutable typed slice as its unsigned twin.
pub fn as_bits_mut<T: Element>(data: &mut [T]) -> &mut [T::Bits] {
    bytemuck::cast_slice_mut(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_view_preserves_bit_pattern() {
        let data: Vec<i16> = vec![-1, 0, 1, i16::MIN];
        let bits = as_bits(&data);
        assert_eq!(bits, &[0xffffu16, 0, 1, 0x8000]);
    }

    #[test]
    fn test_voxel_type_tags_match_signedness() {
        assert_eq!(<i8 as Element>::SIGNED, <i8 as Element>::VOXEL_TYPE.is_signed());
        assert_eq!(<u64 as Element>::SIGNED, <u64 as Element>::VOXEL_TYPE.is_signed());
        assert_eq!(<i32 as Element>::VOXEL_TYPE.bit_width(), 32);
    }
}
