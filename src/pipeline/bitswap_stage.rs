// In: src/pipeline/bitswap_stage.rs

//! The bitplane reorder stage.
//!
//! `BitswapStage` owns a validated `BitswapConfig` and turns it into kernel
//! calls: it picks the kernel family (scalar, portable lanes or SSE2 lanes),
//! splits the work over a `rayon` pool, and applies the remainder policy.
//!
//! Remainder policy: the kernels only accept lengths that are a multiple of
//! the plane count. The stage transforms the largest such prefix and copies
//! the remaining `N % num_planes` elements verbatim, on encode and decode.

use std::borrow::Cow;

use rayon::prelude::*;

use crate::config::BitswapConfig;
use crate::detect::{resolve_backend, Backend};
use crate::error::BitswapError;
use crate::kernels::bits::{BitWord, PlaneLayout};
use crate::kernels::lanes::LaneVector;
use crate::kernels::{bitplane_scalar, bitplane_vector, bitshuffle};
use crate::pipeline::stage::{Stage, StageContext};
use crate::traits::{as_bits, as_bits_mut, Element};
use crate::types::VoxelType;
use crate::utils::{bytes_to_typed_vec, run_with_threads, safe_bytes_to_typed_slice, shape_len};

/// Stage name prefix; the plane width is appended.
pub const NAME_PREFIX: &str = "bitswap";

/// Signature shared by the segment encoders and range decoders of every
/// kernel family: `(input, signed, layout, first, out)`.
type Kernel<U> = fn(&[U], bool, &PlaneLayout, usize, &mut [U]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitswapStage {
    config: BitswapConfig,
}

impl BitswapStage {
    pub fn new(config: BitswapConfig) -> Result<Self, BitswapError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Builds a stage from its `config()` string.
    pub fn from_config(config: &str) -> Result<Self, BitswapError> {
        Self::new(BitswapConfig::default().apply_minors(config)?)
    }

    /// Builds a stage from a `bitswap<P>` name and an optional config
    /// string. A plane width in the config must agree with the name.
    pub fn from_name(name: &str, config: &str) -> Result<Self, BitswapError> {
        let plane_width: u32 = name
            .strip_prefix(NAME_PREFIX)
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| BitswapError::UnknownStage(name.to_string()))?;
        let parsed = BitswapConfig::new(plane_width).apply_minors(config)?;
        if parsed.num_bits_per_plane != plane_width {
            return Err(BitswapError::InvalidConfig(format!(
                "{} conflicts with num_bits_per_plane={}",
                name, parsed.num_bits_per_plane
            )));
        }
        Self::new(parsed)
    }

    pub fn settings(&self) -> &BitswapConfig {
        &self.config
    }

    pub fn plane_width(&self) -> u32 {
        self.config.num_bits_per_plane
    }

    /// Reorders the first `shape_len(shape)` elements of `input` into
    /// `output`. Returns the number of elements written.
    pub fn encode<T: Element>(&self, input: &[T], output: &mut [T], shape: &[usize]) -> Result<usize, BitswapError> {
        let n = check_shape(input.len(), output.len(), shape)?;
        let layout = PlaneLayout::for_word::<T::Bits>(self.plane_width())?;
        let prefix = layout.divisible_prefix(n);

        let (head_in, tail_in) = as_bits(input).split_at(prefix);
        let (head_out, tail_out) = as_bits_mut(output).split_at_mut(prefix);
        copy_tail(tail_in, tail_out, &layout);

        let backend = resolve_backend(self.config.vectorisation);
        let used = self.with_fallback(backend, |b| {
            self.encode_words(b, head_in, T::SIGNED, &layout, head_out)
        })?;

        log_metric!(
            "event" = "encode",
            "dtype" = T::VOXEL_TYPE,
            "plane_width" = self.plane_width(),
            "backend" = used.as_str(),
            "n" = n,
            "threads" = self.config.n_threads
        );
        Ok(n)
    }

    /// Inverse of [`encode`](Self::encode).
    pub fn decode<T: Element>(&self, input: &[T], output: &mut [T], shape: &[usize]) -> Result<(), BitswapError> {
        let n = check_shape(input.len(), output.len(), shape)?;
        let layout = PlaneLayout::for_word::<T::Bits>(self.plane_width())?;
        let prefix = layout.divisible_prefix(n);

        let (head_in, tail_in) = as_bits(input).split_at(prefix);
        let (head_out, tail_out) = as_bits_mut(output).split_at_mut(prefix);
        copy_tail(tail_in, tail_out, &layout);

        let backend = resolve_backend(self.config.vectorisation);
        let used = self.with_fallback(backend, |b| {
            self.decode_words(b, head_in, T::SIGNED, &layout, head_out)
        })?;

        log_metric!(
            "event" = "decode",
            "dtype" = T::VOXEL_TYPE,
            "plane_width" = self.plane_width(),
            "backend" = used.as_str(),
            "n" = n,
            "threads" = self.config.n_threads
        );
        Ok(())
    }

    //==============================================================================
    // Path selection
    //==============================================================================

    /// Runs `op` on `backend`; a vector backend that cannot fill one register
    /// is retried on the scalar kernel. Returns the backend that ran.
    fn with_fallback<F>(&self, backend: Backend, mut op: F) -> Result<Backend, BitswapError>
    where
        F: FnMut(Backend) -> Result<(), BitswapError>,
    {
        match op(backend) {
            Ok(()) => Ok(backend),
            Err(BitswapError::RegisterUnderflow { available, .. }) => {
                log::debug!(
                    "{}: {} bytes do not fill a register, using the scalar kernel",
                    self.name(),
                    available
                );
                op(Backend::Scalar)?;
                Ok(Backend::Scalar)
            }
            Err(e) => Err(e),
        }
    }

    fn encode_words<U: BitWord>(
        &self,
        backend: Backend,
        input: &[U],
        signed: bool,
        layout: &PlaneLayout,
        out: &mut [U],
    ) -> Result<(), BitswapError> {
        match backend {
            Backend::Scalar => self.encode_parallel(input, signed, layout, out, bitplane_scalar::encode_segments::<U>),
            Backend::Portable => self.encode_vector::<U, U::Portable>(input, signed, layout, out),
            #[cfg(target_arch = "x86_64")]
            Backend::Sse2 => self.encode_vector::<U, U::Sse2>(input, signed, layout, out),
            #[cfg(not(target_arch = "x86_64"))]
            Backend::Sse2 => self.encode_vector::<U, U::Portable>(input, signed, layout, out),
        }
    }

    fn decode_words<U: BitWord>(
        &self,
        backend: Backend,
        input: &[U],
        signed: bool,
        layout: &PlaneLayout,
        out: &mut [U],
    ) -> Result<(), BitswapError> {
        match backend {
            Backend::Scalar => self.decode_parallel(input, signed, layout, out, 1, bitplane_scalar::decode_range::<U>),
            Backend::Portable => self.decode_vector::<U, U::Portable>(input, signed, layout, out),
            #[cfg(target_arch = "x86_64")]
            Backend::Sse2 => self.decode_vector::<U, U::Sse2>(input, signed, layout, out),
            #[cfg(not(target_arch = "x86_64"))]
            Backend::Sse2 => self.decode_vector::<U, U::Portable>(input, signed, layout, out),
        }
    }

    fn encode_vector<U: BitWord, V: LaneVector<U>>(
        &self,
        input: &[U],
        signed: bool,
        layout: &PlaneLayout,
        out: &mut [U],
    ) -> Result<(), BitswapError> {
        bitplane_vector::check_register(std::mem::size_of_val(input))?;
        let batch = V::LANES * layout.num_planes;
        if self.config.n_threads == 1 && input.len() % batch == 0 {
            return bitshuffle::encode_words::<U, V>(input, signed, layout.plane_width, out);
        }
        self.encode_parallel(input, signed, layout, out, bitplane_vector::encode_segments::<U, V>)
    }

    fn decode_vector<U: BitWord, V: LaneVector<U>>(
        &self,
        input: &[U],
        signed: bool,
        layout: &PlaneLayout,
        out: &mut [U],
    ) -> Result<(), BitswapError> {
        bitplane_vector::check_register(std::mem::size_of_val(input))?;
        self.decode_parallel(input, signed, layout, out, V::LANES, bitplane_vector::decode_range::<U, V>)
    }

    //==============================================================================
    // Work partitioning
    //==============================================================================

    /// Each worker owns a run of whole segments and reads all of `input`.
    fn encode_parallel<U: BitWord>(
        &self,
        input: &[U],
        signed: bool,
        layout: &PlaneLayout,
        out: &mut [U],
        kernel: Kernel<U>,
    ) -> Result<(), BitswapError> {
        let seg_len = layout.segment_len(input.len())?;
        let n_threads = self.config.n_threads;
        if n_threads == 1 || seg_len == 0 {
            kernel(input, signed, layout, 0, out);
            return Ok(());
        }
        let segments_per_worker = layout.num_planes.div_ceil(n_threads);
        run_with_threads(n_threads, || {
            out.par_chunks_mut(segments_per_worker * seg_len)
                .enumerate()
                .for_each(|(c, chunk)| kernel(input, signed, layout, c * segments_per_worker, chunk));
        })
    }

    /// Each worker owns a contiguous run of output elements whose start is
    /// a multiple of `num_planes * lanes`, and reads all segments.
    fn decode_parallel<U: BitWord>(
        &self,
        input: &[U],
        signed: bool,
        layout: &PlaneLayout,
        out: &mut [U],
        lanes: usize,
        kernel: Kernel<U>,
    ) -> Result<(), BitswapError> {
        layout.segment_len(input.len())?;
        let n_threads = self.config.n_threads;
        let n = out.len();
        if n_threads == 1 || n == 0 {
            kernel(input, signed, layout, 0, out);
            return Ok(());
        }
        let granule = layout.num_planes * lanes;
        let chunk = n.div_ceil(n_threads).div_ceil(granule) * granule;
        run_with_threads(n_threads, || {
            out.par_chunks_mut(chunk)
                .enumerate()
                .for_each(|(c, part)| kernel(input, signed, layout, c * chunk, part));
        })
    }

    //==============================================================================
    // Byte-level helpers
    //==============================================================================

    fn encode_bytes<T: Element>(&self, input: &[u8], output: &mut Vec<u8>, ctx: &StageContext) -> Result<(), BitswapError> {
        let typed = typed_view::<T>(input)?;
        let mut out = vec![T::zeroed(); typed.len()];
        self.encode(&typed, &mut out, &ctx.shape)?;
        output.extend_from_slice(bytemuck::cast_slice(&out));
        Ok(())
    }

    fn decode_bytes<T: Element>(&self, input: &[u8], output: &mut Vec<u8>, ctx: &StageContext) -> Result<(), BitswapError> {
        let typed = typed_view::<T>(input)?;
        let mut out = vec![T::zeroed(); typed.len()];
        self.decode(&typed, &mut out, &ctx.shape)?;
        output.extend_from_slice(bytemuck::cast_slice(&out));
        Ok(())
    }
}

/// Zero-copy view when the bytes are aligned, an aligned copy otherwise.
pub(crate) fn typed_view<T: Element>(bytes: &[u8]) -> Result<Cow<'_, [T]>, BitswapError> {
    match safe_bytes_to_typed_slice::<T>(bytes) {
        Ok(slice) => Ok(Cow::Borrowed(slice)),
        Err(BitswapError::Misaligned(_)) => Ok(Cow::Owned(bytes_to_typed_vec::<T>(bytes)?)),
        Err(e) => Err(e),
    }
}

/// Both buffers hold exactly the elements `shape` describes.
fn check_shape(input: usize, output: usize, shape: &[usize]) -> Result<usize, BitswapError> {
    crate::kernels::check_lengths(input, output)?;
    let n = shape_len(shape);
    if n != input {
        return Err(BitswapError::InvalidConfig(format!(
            "shape {:?} describes {} elements, buffers hold {}",
            shape, n, input
        )));
    }
    Ok(n)
}

fn copy_tail<U: BitWord>(tail_in: &[U], tail_out: &mut [U], layout: &PlaneLayout) {
    if tail_in.is_empty() {
        return;
    }
    log::warn!(
        "{} trailing elements are not a multiple of {} planes and are copied verbatim",
        tail_in.len(),
        layout.num_planes
    );
    tail_out.copy_from_slice(tail_in);
}

//==================================================================================
// Byte-level stage contract
//==================================================================================

/// Expands to a `match` over every integer `VoxelType`, calling
/// `$self.$method::<T>(...)` with the matching element type.
macro_rules! dispatch_dtype {
    ($self:ident, $method:ident, $dtype:expr, $($arg:expr),*) => {
        match $dtype {
            VoxelType::UInt8 => $self.$method::<u8>($($arg),*),
            VoxelType::Int8 => $self.$method::<i8>($($arg),*),
            VoxelType::UInt16 => $self.$method::<u16>($($arg),*),
            VoxelType::Int16 => $self.$method::<i16>($($arg),*),
            VoxelType::UInt32 => $self.$method::<u32>($($arg),*),
            VoxelType::Int32 => $self.$method::<i32>($($arg),*),
            VoxelType::UInt64 => $self.$method::<u64>($($arg),*),
            VoxelType::Int64 => $self.$method::<i64>($($arg),*),
        }
    };
}

impl Stage for BitswapStage {
    fn name(&self) -> String {
        format!("{}{}", NAME_PREFIX, self.plane_width())
    }

    fn config(&self) -> String {
        self.config.to_minors()
    }

    fn is_compressor(&self) -> bool {
        false
    }

    fn max_encoded_size(&self, input_bytes: usize) -> usize {
        input_bytes
    }

    fn encode(&self, input: &[u8], output: &mut Vec<u8>, ctx: &StageContext) -> Result<(), BitswapError> {
        dispatch_dtype!(self, encode_bytes, ctx.dtype, input, output, ctx)
    }

    fn decode(&self, input: &[u8], output: &mut Vec<u8>, ctx: &StageContext) -> Result<(), BitswapError> {
        dispatch_dtype!(self, decode_bytes, ctx.dtype, input, output, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vectorisation;

    fn stage(p: u32, threads: usize, v: Vectorisation) -> BitswapStage {
        BitswapStage::new(BitswapConfig::new(p).with_threads(threads).with_vectorisation(v)).unwrap()
    }

    #[test]
    fn test_name_and_config() {
        let s = stage(4, 2, Vectorisation::Auto);
        assert_eq!(s.name(), "bitswap4");
        assert_eq!(s.config(), "num_bits_per_plane=4,n_threads=2,vectorisation=auto");
        assert!(!s.is_compressor());
        assert_eq!(s.max_encoded_size(1234), 1234);
        assert_eq!(BitswapStage::from_config(&s.config()).unwrap(), s);
    }

    #[test]
    fn test_from_name_conflict() {
        assert!(BitswapStage::from_name("bitswap2", "n_threads=3").is_ok());
        assert!(matches!(
            BitswapStage::from_name("bitswap2", "num_bits_per_plane=4"),
            Err(BitswapError::InvalidConfig(_))
        ));
        assert!(matches!(
            BitswapStage::from_name("bitswapx", ""),
            Err(BitswapError::UnknownStage(_))
        ));
        assert!(matches!(
            BitswapStage::from_name("bitswap3", ""),
            Err(BitswapError::InvalidPlaneWidth { .. })
        ));
    }

    #[test]
    fn test_remainder_tail_copied_verbatim() {
        // 16 planes for u16 at P=1; 35 elements leave a 3-element tail.
        let input: Vec<u16> = (0..35).map(|x| x * 1000 + 7).collect();
        for v in [Vectorisation::Scalar, Vectorisation::Portable, Vectorisation::Auto] {
            let s = stage(1, 1, v);
            let mut enc = vec![0u16; 35];
            assert_eq!(s.encode(&input, &mut enc, &[5, 7]).unwrap(), 35);
            assert_eq!(&enc[32..], &input[32..]);

            let mut head = vec![0u16; 32];
            bitplane_scalar::encode(&input[..32], &mut head, 1).unwrap();
            assert_eq!(&enc[..32], &head[..]);

            let mut dec = vec![0u16; 35];
            s.decode(&enc, &mut dec, &[35]).unwrap();
            assert_eq!(dec, input);
        }
    }

    #[test]
    fn test_remainder_tail_longer_than_a_register() {
        // u64 at P=1 has 64 planes and 2 lanes; 165 elements leave 37 behind.
        let input: Vec<i64> = (0..165i64).map(|x| (x - 80) * 0x0101_0101_0101).collect();
        let mut head = vec![0i64; 128];
        bitplane_scalar::encode(&input[..128], &mut head, 1).unwrap();
        for v in [Vectorisation::Scalar, Vectorisation::Portable, Vectorisation::Auto] {
            for threads in [1, 3] {
                let s = stage(1, threads, v);
                let mut enc = vec![0i64; 165];
                assert_eq!(s.encode(&input, &mut enc, &[165]).unwrap(), 165);
                assert_eq!(&enc[..128], &head[..]);
                assert_eq!(&enc[128..], &input[128..]);

                let mut dec = vec![0i64; 165];
                s.decode(&enc, &mut dec, &[3, 55]).unwrap();
                assert_eq!(dec, input);
            }
        }
    }

    #[test]
    fn test_single_thread_batched_path_matches_scalar() {
        // 384 u16 elements are three whole batches of 8 lanes * 16 planes.
        let input: Vec<u16> = (0..384u16).map(|x| x.wrapping_mul(40_503)).collect();
        let mut expected = vec![0u16; 384];
        bitplane_scalar::encode(&input, &mut expected, 1).unwrap();
        for v in [Vectorisation::Portable, Vectorisation::Auto] {
            let s = stage(1, 1, v);
            let mut enc = vec![0u16; 384];
            s.encode(&input, &mut enc, &[384]).unwrap();
            assert_eq!(enc, expected, "{:?}", v);
        }
    }

    #[test]
    fn test_small_input_falls_back_to_scalar() {
        // 4 bytes cannot fill a register; the stage must still succeed.
        let input = [-3i8, 5, -128, 127];
        let s = stage(4, 1, Vectorisation::Portable);
        let mut enc = [0i8; 4];
        let mut dec = [0i8; 4];
        s.encode(&input, &mut enc, &[4]).unwrap();
        s.decode(&enc, &mut dec, &[4]).unwrap();
        assert_eq!(dec, input);
    }

    #[test]
    fn test_plane_wider_than_type_is_rejected() {
        let s = stage(16, 1, Vectorisation::Auto);
        let mut out = [0u8; 32];
        assert!(matches!(
            s.encode(&[0u8; 32], &mut out, &[32]),
            Err(BitswapError::InvalidPlaneWidth {
                plane_width: 16,
                type_width: 8
            })
        ));
    }

    #[test]
    fn test_shape_must_match_buffers() {
        let s = stage(1, 1, Vectorisation::Scalar);
        let mut out = [0u16; 16];
        assert!(matches!(
            s.encode(&[0u16; 16], &mut out, &[4, 3]),
            Err(BitswapError::InvalidConfig(_))
        ));
        let mut short = [0u16; 15];
        assert!(matches!(
            s.encode(&[0u16; 16], &mut short, &[16]),
            Err(BitswapError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_threads_do_not_change_output() {
        let input: Vec<u32> = (0..4099u32).map(|x| x.wrapping_mul(2_654_435_761)).collect();
        for v in [Vectorisation::Scalar, Vectorisation::Portable, Vectorisation::Auto] {
            for p in [1, 2, 8, 32] {
                let mut reference = vec![0u32; input.len()];
                stage(p, 1, Vectorisation::Scalar)
                    .encode(&input, &mut reference, &[input.len()])
                    .unwrap();
                for threads in [2, 3, 7] {
                    let s = stage(p, threads, v);
                    let mut enc = vec![0u32; input.len()];
                    s.encode(&input, &mut enc, &[input.len()]).unwrap();
                    assert_eq!(enc, reference, "p={} threads={} {:?}", p, threads, v);
                    let mut dec = vec![0u32; input.len()];
                    s.decode(&enc, &mut dec, &[input.len()]).unwrap();
                    assert_eq!(dec, input);
                }
            }
        }
    }

    #[test]
    fn test_byte_level_stage_unaligned_input() {
        let s = stage(2, 1, Vectorisation::Auto);
        let values: Vec<i16> = (-64..64).collect();
        let mut raw = vec![0u8];
        raw.extend_from_slice(bytemuck::cast_slice(&values));
        let ctx = StageContext::flat(VoxelType::Int16, values.len() * 2);

        let mut enc = Vec::new();
        Stage::encode(&s, &raw[1..], &mut enc, &ctx).unwrap();
        assert_eq!(enc.len(), raw.len() - 1);

        let mut dec = Vec::new();
        Stage::decode(&s, &enc, &mut dec, &ctx).unwrap();
        assert_eq!(&dec[..], &raw[1..]);
    }
}
