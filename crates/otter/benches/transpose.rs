use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use otter::util::transpose::transpose;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn bench_transpose(c: &mut Criterion) {
    let mut group = c.benchmark_group("transpose");
    let mut rng = StdRng::seed_from_u64(42);
    for rows in [1 << 10, 1 << 14, 1 << 18] {
        let cols = 128;
        let mat: Vec<u8> = (0..rows * cols / 8).map(|_| rng.gen()).collect();
        group.throughput(Throughput::Bytes((rows * cols / 8) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &mat, |b, mat| {
            b.iter(|| transpose(mat, rows, cols));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transpose);
criterion_main!(benches);
