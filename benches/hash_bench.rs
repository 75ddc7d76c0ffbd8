/// Hashing and similarity benchmarks
/// Measures SHA-256 throughput, decode + perceptual hash cost and the linear
/// similarity scan at growing table sizes
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use tokio::runtime::Runtime;

use pixeldedup::application::dedup::{LinearScanSearch, SimilaritySearch};
use pixeldedup::application::hashing::ContentHasher;
use pixeldedup::application::ports::ImageRecordRepository;
use pixeldedup::domain::entities::ImageRecord;
use pixeldedup::domain::value_objects::{
    CanonicalPath, ContentHash, PerceptualHash, UploadDescriptor,
};
use pixeldedup::infrastructure::imaging::ImageCrateDecoder;
use pixeldedup::infrastructure::persistence::InMemoryImageRecordRepository;
use pixeldedup::infrastructure::storage::PathNormalizer;

fn png(size: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(size, size, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn exact_digest_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_digest");
    group.measurement_time(Duration::from_secs(5));

    for size in [1024, 64 * 1024, 1024 * 1024, 10 * 1024 * 1024] {
        let data = vec![0xa5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| ContentHasher::exact_digest(data))
        });
    }

    group.finish();
}

fn analyze_benchmarks(c: &mut Criterion) {
    let hasher = ContentHasher::new(Arc::new(ImageCrateDecoder::new()));
    let mut group = c.benchmark_group("decode_and_perceptual_hash");

    for side in [64u32, 512, 2048] {
        let data = png(side);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(side), &data, |b, data| {
            b.iter(|| hasher.analyze(data))
        });
    }

    group.finish();
}

fn similarity_benchmarks(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("linear_similarity_scan");

    for count in [100usize, 1_000, 10_000] {
        let repo = Arc::new(InMemoryImageRecordRepository::new());
        rt.block_on(async {
            for i in 0..count {
                let hash = ContentHash::from_str(&format!("{:064x}", i)).unwrap();
                let phash = PerceptualHash::from_bytes((i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15).to_be_bytes());
                let record = ImageRecord::new(
                    hash,
                    Some(phash),
                    CanonicalPath::from(format!("posts/{}.png", i)),
                    UploadDescriptor {
                        original_filename: "bench.png".to_string(),
                        mime_type: "image/png".to_string(),
                        byte_size: 1,
                        upload_context: "post".to_string(),
                        uploader_id: 1,
                    },
                    None,
                );
                repo.insert(&record).await.unwrap();
            }
        });

        let search = LinearScanSearch::new(repo);
        let query = PerceptualHash::from_bytes(vec![0u8; 8]);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.to_async(&rt).iter(|| search.find_similar(&query, 10))
        });
    }

    group.finish();
}

fn normalize_benchmarks(c: &mut Criterion) {
    let normalizer = PathNormalizer::new()
        .with_bucket("media")
        .with_public_base("https://cdn.example.com");
    let inputs = [
        "posts/ab12.jpg",
        "/uploads/posts/ab12.jpg",
        "https://cdn.example.com/posts/ab12.jpg?w=200",
        "https://host/storage/v1/object/public/media/posts/ab12.jpg",
    ];

    c.bench_function("normalize_legacy_forms", |b| {
        b.iter(|| {
            for input in &inputs {
                normalizer.normalize(input);
            }
        })
    });
}

criterion_group!(
    benches,
    exact_digest_benchmarks,
    analyze_benchmarks,
    similarity_benchmarks,
    normalize_benchmarks
);
criterion_main!(benches);
