//! Benchmarks for bottom-up saturation
//!
//! Measures transitive closure over chain and complete graphs for the
//! serial and chunked concurrent drivers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_core::{Engine, EngineConfig, EngineVariant};

/// edge(n0, n1). edge(n1, n2). ...
fn chain_program(n: usize) -> String {
    let mut source = String::from(
        "tc(X, Y) :- edge(X, Y). \
         tc(X, Y) :- edge(X, Z), tc(Z, Y). ",
    );
    for i in 0..n {
        source.push_str(&format!("edge(n{}, n{}). ", i, i + 1));
    }
    source
}

/// Complete digraph on n nodes (no self loops)
fn complete_program(n: usize) -> String {
    let mut source = String::from(
        "tc(X, Y) :- edge(X, Y). \
         tc(X, Y) :- edge(X, Z), tc(Z, Y). ",
    );
    for i in 0..n {
        for j in 0..n {
            if i != j {
                source.push_str(&format!("edge(n{}, n{}). ", i, j));
            }
        }
    }
    source
}

fn saturate(variant: EngineVariant, chunk_size: usize, source: &str) -> usize {
    let mut engine = Engine::new(EngineConfig {
        variant,
        chunk_size,
        ..EngineConfig::default()
    });
    let queries = engine.load(&format!("{} tc(X, Y)?", source)).unwrap();
    engine.query(&queries[0]).unwrap().len()
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_closure");
    for size in [64, 128] {
        let source = chain_program(size);
        group.bench_with_input(BenchmarkId::new("serial", size), &source, |b, source| {
            b.iter(|| saturate(EngineVariant::SemiNaiveSerial, 64, black_box(source)))
        });
        group.bench_with_input(BenchmarkId::new("chunked", size), &source, |b, source| {
            b.iter(|| saturate(EngineVariant::ChunkedConcurrent, 64, black_box(source)))
        });
    }
    group.finish();
}

fn bench_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("complete_closure");
    group.sample_size(20);
    for size in [12, 20] {
        let source = complete_program(size);
        group.bench_with_input(BenchmarkId::new("serial", size), &source, |b, source| {
            b.iter(|| saturate(EngineVariant::SemiNaiveSerial, 64, black_box(source)))
        });
        group.bench_with_input(BenchmarkId::new("chunked", size), &source, |b, source| {
            b.iter(|| saturate(EngineVariant::ChunkedConcurrent, 64, black_box(source)))
        });
    }
    group.finish();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let source = chain_program(96);
    let mut group = c.benchmark_group("chunk_size");
    for chunk_size in [1, 16, 64, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    saturate(
                        EngineVariant::ChunkedConcurrent,
                        chunk_size,
                        black_box(&source),
                    )
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_chain, bench_complete, bench_chunk_sizes);
criterion_main!(benches);
