use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pgvector_ann::{AnnAlgorithm, Dataset, HnswParams, MemoryEngine, PgVector, PgVectorConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn random_rows(rng: &mut StdRng, n: usize, dim: usize) -> Vec<Vec<f32>> {
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    (0..n)
        .map(|_| (0..dim).map(|_| normal.sample(rng)).collect())
        .collect()
}

fn bench_query(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xA11);
    let queries = random_rows(&mut rng, 64, 128);

    let mut group = c.benchmark_group("memory_query");
    for n in [1_000usize, 10_000] {
        let train = Dataset::from_rows(&random_rows(&mut rng, n, 128)).unwrap();
        let mut algo = PgVector::with_connector(
            "angular",
            HnswParams::new(16, 64).unwrap(),
            PgVectorConfig::default(),
            Box::new(MemoryEngine::new()),
        )
        .unwrap();
        algo.fit(&train).unwrap();
        algo.set_query_arguments(40).unwrap();

        group.bench_with_input(BenchmarkId::new("k10", n), &n, |b, _| {
            let mut i = 0;
            b.iter(|| {
                let q = &queries[i % queries.len()];
                i += 1;
                black_box(algo.query(q, 10).unwrap())
            })
        });

        algo.done().unwrap();
    }
    group.finish();
}

criterion_group!(benches, bench_query);
criterion_main!(benches);
