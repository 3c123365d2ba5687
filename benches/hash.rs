//! Benchmarks for the table-entry string hashing helpers.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mpqdeck::hash::{hash_string, hash_type};

fn bench_hash_string(c: &mut Criterion) {
    let short = "units\\human\\footman.mdx";
    let long = "interface\\glues\\loadingscreens\\loadingscreenbackgroundwar3x.blp";

    c.bench_function("hash_string/table_offset/short", |b| {
        b.iter(|| hash_string(black_box(short), hash_type::TABLE_OFFSET))
    });
    c.bench_function("hash_string/name_a/short", |b| {
        b.iter(|| hash_string(black_box(short), hash_type::NAME_A))
    });
    c.bench_function("hash_string/name_a/long", |b| {
        b.iter(|| hash_string(black_box(long), hash_type::NAME_A))
    });
}

criterion_group!(benches, bench_hash_string);
criterion_main!(benches);
