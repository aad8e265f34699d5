//! Throughput of exact brute-force k-NN over a synthetic chunk snapshot.
//! Exact k-NN is only viable while candidate counts stay small; this
//! benchmark is what `retrieval_exact_ceiling_chunks` is tuned against.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sentinel_orchestrator::retrieval::{exact_knn, ChunkSnapshot, DocumentChunk, MetadataFilter};
use uuid::Uuid;

const DIMENSION: usize = 768;

fn synthetic_chunk(ordinal: u32, dim: usize) -> DocumentChunk {
    let embedding: Vec<f32> = (0..dim)
        .map(|i| ((ordinal as usize + i) % 97) as f32 / 97.0)
        .collect();
    DocumentChunk {
        chunk_id: Uuid::new_v4(),
        document_id: format!("doc-{}", ordinal % 50),
        ordinal,
        text: "synthetic corpus chunk text for benchmarking".to_string(),
        embedding,
        metadata: BTreeMap::new(),
    }
}

fn bench_exact_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_knn");
    for &size in &[100usize, 1_000, 10_000] {
        let chunks: Vec<DocumentChunk> = (0..size as u32).map(|i| synthetic_chunk(i, DIMENSION)).collect();
        let snapshot = ChunkSnapshot { chunks };
        let query: Vec<f32> = (0..DIMENSION).map(|i| (i % 31) as f32 / 31.0).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let results = exact_knn(black_box(&snapshot), black_box(&query), 10, &MetadataFilter::default());
                black_box(results);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_exact_knn);
criterion_main!(benches);
