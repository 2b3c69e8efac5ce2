//! The 128-bit register abstraction used by the vectorized kernels.
//!
//! `LaneVector` names the handful of lane-wise operations the bitplane
//! kernels need. `PortableLanes` implements them on a plain array and is the
//! reference the SSE2 implementation is tested against.

use crate::kernels::bits::BitWord;

/// Size of one register in bytes.
pub const REGISTER_BYTES: usize = 16;

/// One 128-bit register holding `LANES` words of type `U`.
pub trait LaneVector<U: BitWord>: Copy + Send + Sync {
    /// Number of lanes, always `128 / U::WIDTH`.
    const LANES: usize;

    /// Loads the first `LANES` words of `src`. No alignment is required.
    fn load(src: &[U]) -> Self;

    /// Stores all lanes into the first `LANES` words of `dst`.
    fn store(self, dst: &mut [U]);

    fn zero() -> Self;

    /// Logical left shift of every lane; `n >= WIDTH` yields zero.
    fn shl(self, n: u32) -> Self;

    /// Logical right shift of every lane; `n >= WIDTH` yields zero.
    fn shr(self, n: u32) -> Self;

    fn or(self, other: Self) -> Self;

    /// Lane-wise sign-fold: lanes with the top bit set get every other bit
    /// inverted.
    fn fold_sign(self) -> Self;

    fn rotate_left_one(self) -> Self;

    fn rotate_right_one(self) -> Self;

    /// Bit `k` of the result is the most significant bit of lane `k`.
    fn gather_msb(self) -> u32;

    /// Inverse of `gather_msb`: lane `k` is `1 << (WIDTH - 1)` if bit `k` of
    /// `mask` is set, zero otherwise.
    fn scatter_msb(mask: u32) -> Self;

    /// Encode-side preprocessing for a whole register.
    #[inline(always)]
    fn preprocess(self, signed: bool) -> Self {
        let v = if signed { self.fold_sign() } else { self };
        v.rotate_left_one()
    }

    /// Decode-side postprocessing for a whole register.
    #[inline(always)]
    fn postprocess(self, signed: bool) -> Self {
        let v = self.rotate_right_one();
        if signed {
            v.fold_sign()
        } else {
            v
        }
    }
}

//==================================================================================
// Portable implementation
//==================================================================================

/// Array-backed register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortableLanes<U, const L: usize>(pub [U; L]);

impl<U: BitWord, const L: usize> PortableLanes<U, L> {
    #[inline(always)]
    fn map(self, f: impl Fn(U) -> U) -> Self {
        Self(self.0.map(f))
    }
}

impl<U: BitWord, const L: usize> LaneVector<U> for PortableLanes<U, L> {
    const LANES: usize = L;

    #[inline(always)]
    fn load(src: &[U]) -> Self {
        let mut lanes = [U::zero(); L];
        lanes.copy_from_slice(&src[..L]);
        Self(lanes)
    }

    #[inline(always)]
    fn store(self, dst: &mut [U]) {
        dst[..L].copy_from_slice(&self.0);
    }

    #[inline(always)]
    fn zero() -> Self {
        Self([U::zero(); L])
    }

    #[inline(always)]
    fn shl(self, n: u32) -> Self {
        if n >= U::WIDTH {
            return Self::zero();
        }
        self.map(|x| x << n as usize)
    }

    #[inline(always)]
    fn shr(self, n: u32) -> Self {
        if n >= U::WIDTH {
            return Self::zero();
        }
        self.map(|x| x >> n as usize)
    }

    #[inline(always)]
    fn or(self, other: Self) -> Self {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(other.0) {
            *a = *a | b;
        }
        Self(out)
    }

    #[inline(always)]
    fn fold_sign(self) -> Self {
        self.map(|x| crate::kernels::bits::fold_sign(x, true))
    }

    #[inline(always)]
    fn rotate_left_one(self) -> Self {
        self.map(|x| x.rotate_left(1))
    }

    #[inline(always)]
    fn rotate_right_one(self) -> Self {
        self.map(|x| x.rotate_right(1))
    }

    #[inline(always)]
    fn gather_msb(self) -> u32 {
        let top = U::WIDTH as usize - 1;
        self.0.iter().enumerate().fold(0u32, |mask, (k, &x)| {
            mask | (((x >> top) & U::one()).widen() as u32) << k
        })
    }

    #[inline(always)]
    fn scatter_msb(mask: u32) -> Self {
        let msb = U::one() << (U::WIDTH as usize - 1);
        let mut lanes = [U::zero(); L];
        for (k, lane) in lanes.iter_mut().enumerate() {
            if (mask >> k) & 1 == 1 {
                *lane = msb;
            }
        }
        Self(lanes)
    }
}
