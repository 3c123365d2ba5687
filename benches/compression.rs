//! Benchmarks for the composed-codec decompressor.

use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use mpqdeck::compression::{decompress, flags};

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn bench_decompress_zlib(c: &mut Criterion) {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut original = Vec::new();
    for _ in 0..(64 * 1024 / pattern.len()) {
        original.extend_from_slice(pattern);
    }

    let compressed = zlib_compress(&original);
    let mut block = vec![flags::ZLIB];
    block.extend_from_slice(&compressed);

    c.bench_function("decompress/zlib/64KiB", |b| {
        b.iter(|| decompress(black_box(&block), original.len()).unwrap())
    });
}

criterion_group!(benches, bench_decompress_zlib);
criterion_main!(benches);
