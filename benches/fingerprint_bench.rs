use criterion::{black_box, criterion_group, criterion_main, Criterion};
use subtitle_pipeline::document::sanitize_filename;
use subtitle_pipeline::fingerprint::{sample_ranges, SAMPLE_BLOCK_SIZE};
use subtitle_pipeline::{ContentFingerprint, FingerprintStore};

fn bench_fingerprint_digest(c: &mut Criterion) {
    let samples = vec![0xABu8; SAMPLE_BLOCK_SIZE as usize * 3];

    c.bench_function("fingerprint_from_samples", |b| {
        b.iter(|| black_box(ContentFingerprint::from_parts(&samples, 1 << 30, 1_700_000_000.5)))
    });

    c.bench_function("fingerprint_sample_ranges", |b| {
        b.iter(|| {
            black_box(sample_ranges(black_box(1_000)));
            black_box(sample_ranges(black_box(100_000)));
            black_box(sample_ranges(black_box(5_000_000_000)));
        })
    });
}

fn bench_fingerprint_file(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("large.mp4");
    std::fs::write(&path, vec![7u8; 16 * 1024 * 1024]).unwrap();

    c.bench_function("fingerprint_16mb_file", |b| {
        b.iter(|| runtime.block_on(async { black_box(ContentFingerprint::compute(&path).await.unwrap()) }))
    });

    let store = FingerprintStore::new();
    runtime.block_on(store.get_or_compute(&path)).unwrap();
    c.bench_function("fingerprint_store_cache_hit", |b| {
        b.iter(|| runtime.block_on(async { black_box(store.get_or_compute(&path).await.unwrap()) }))
    });
}

fn bench_sanitize_filename(c: &mut Criterion) {
    c.bench_function("sanitize_filename", |b| {
        b.iter(|| {
            black_box(sanitize_filename(black_box("Lecture 12: Q&A | What's next? <final>")));
            black_box(sanitize_filename(black_box("第一课：介绍｜基础？")));
        })
    });
}

criterion_group!(benches, bench_fingerprint_digest, bench_fingerprint_file, bench_sanitize_filename);
criterion_main!(benches);
