//! Benchmarks for the range-to-stream engine (`InnerFile::read_range` /
//! `InnerFile::stream_range`) over a synthetic multi-chunk inner file.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rar_stream::{FileMedia, InnerFile, RarFileChunk, ReadInterval};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

struct InMemoryMedia {
    name: String,
    data: Vec<u8>,
}

impl FileMedia for InMemoryMedia {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_range(
        &self,
        interval: ReadInterval,
    ) -> Pin<Box<dyn Future<Output = rar_stream::error::Result<Vec<u8>>> + Send + '_>> {
        let start = interval.start as usize;
        let end = (interval.end + 1) as usize;
        let data = self.data[start..end.min(self.data.len())].to_vec();
        Box::pin(async move { Ok(data) })
    }
}

fn build_inner_file(chunk_count: usize, chunk_size: usize) -> InnerFile {
    let mut chunks = Vec::with_capacity(chunk_count);
    for i in 0..chunk_count {
        let data = vec![(i % 256) as u8; chunk_size];
        let media: Arc<dyn FileMedia> = Arc::new(InMemoryMedia {
            name: format!("volume{i}.rar"),
            data,
        });
        chunks.push(RarFileChunk::new(media, 0, chunk_size as u64 - 1, i > 0));
    }
    InnerFile::new("bench.bin".to_string(), chunks, 0x30, 0, true)
}

fn bench_read_range(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("inner_file_read_range");

    for &chunk_count in &[1usize, 8, 64] {
        let file = build_inner_file(chunk_count, 16 * 1024);
        let last = file.length - 1;
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_count),
            &chunk_count,
            |b, _| {
                b.to_async(&rt).iter(|| async {
                    file.read_range(ReadInterval { start: 0, end: last })
                        .await
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_stream_range(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let file = build_inner_file(64, 16 * 1024);
    let last = file.length - 1;

    c.bench_function("inner_file_stream_range_64_chunks", |b| {
        b.to_async(&rt).iter(|| async {
            let mut stream = file.stream_range(0, last);
            let mut total = 0usize;
            while let Some(chunk) = stream.next_chunk().await {
                total += chunk.unwrap().len();
            }
            total
        });
    });
}

criterion_group!(benches, bench_read_range, bench_stream_range);
criterion_main!(benches);
