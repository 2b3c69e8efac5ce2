// In bitswap-core/benches/bitplane_bench.rs

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bitswap::kernels::bits::BitWord;
use bitswap::kernels::{bitplane_scalar, bitplane_vector};
use bitswap::{BitswapConfig, BitswapStage};

// --- Mock Data Generation ---

/// A slowly varying ramp with low-order noise, typical of a greyscale volume.
fn generate_volume_u16(size: usize) -> Vec<u16> {
    (0..size)
        .map(|i| 1000 + (i / 64) as u16 + ((i * 7919) % 5) as u16)
        .collect()
}

// --- Benchmark Suite ---

const BENCH_ELEMENTS: usize = 1 << 20;

fn bench_bitplane_kernels(c: &mut Criterion) {
    let data = generate_volume_u16(BENCH_ELEMENTS);
    let mut out = vec![0u16; BENCH_ELEMENTS];

    let mut group = c.benchmark_group("Bitplane Kernels (u16)");
    group.throughput(criterion::Throughput::Bytes((BENCH_ELEMENTS * 2) as u64));

    for p in [1u32, 4] {
        group.bench_function(format!("Encode scalar P={}", p), |b| {
            b.iter(|| bitplane_scalar::encode(black_box(&data), &mut out, p))
        });
        group.bench_function(format!("Encode portable P={}", p), |b| {
            b.iter(|| {
                bitplane_vector::encode::<u16, <u16 as BitWord>::Portable>(black_box(&data), &mut out, p)
            })
        });
        #[cfg(target_arch = "x86_64")]
        group.bench_function(format!("Encode sse2 P={}", p), |b| {
            b.iter(|| bitplane_vector::encode::<u16, <u16 as BitWord>::Sse2>(black_box(&data), &mut out, p))
        });
    }

    let mut encoded = vec![0u16; BENCH_ELEMENTS];
    bitplane_scalar::encode(&data, &mut encoded, 1).unwrap();
    group.bench_function("Decode scalar P=1", |b| {
        b.iter(|| bitplane_scalar::decode(black_box(&encoded), &mut out, 1))
    });
    #[cfg(target_arch = "x86_64")]
    group.bench_function("Decode sse2 P=1", |b| {
        b.iter(|| bitplane_vector::decode::<u16, <u16 as BitWord>::Sse2>(black_box(&encoded), &mut out, 1))
    });

    for threads in [1usize, 4] {
        let stage = BitswapStage::new(BitswapConfig::new(1).with_threads(threads)).unwrap();
        group.bench_function(format!("Stage encode n_threads={}", threads), |b| {
            b.iter(|| stage.encode(black_box(&data), &mut out, &[BENCH_ELEMENTS]))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bitplane_kernels);
criterion_main!(benches);
