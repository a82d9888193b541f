use correlcalc::{Catalog, CorrelationOptionsBuilder, RandomSource, compute_correlation};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use ndarray::Array2;
use rand::distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;
use rand_xoshiro::rand_core::SeedableRng;

fn wedge_catalog(seed: u64, n_points: usize) -> Catalog {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let s_dist = Uniform::try_from(0.1..0.2).unwrap();
    let angle_dist = Uniform::try_from(0.0..0.2).unwrap();
    let weight_dist = Uniform::try_from(0.5..1.5).unwrap();
    let mut positions = Array2::<f64>::zeros((3, n_points));
    for i in 0..n_points {
        positions[[0, i]] = s_dist.sample(&mut rng);
        positions[[1, i]] = angle_dist.sample(&mut rng);
        positions[[2, i]] = angle_dist.sample(&mut rng) - 0.1;
    }
    let weights = (0..n_points).map(|_| weight_dist.sample(&mut rng)).collect();
    Catalog::new(positions, Some(weights)).unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let bin_edges = [0.0, 0.002, 0.004, 0.008, 0.016];
    let mut group = c.benchmark_group("landy_szalay");
    for n_points in [1000_usize, 4000, 16000] {
        let data = wedge_catalog(2525365464_u64, n_points);
        let random = wedge_catalog(1234_u64, 2 * n_points);
        group.throughput(Throughput::Elements(n_points as u64));

        for weights in [false, true] {
            let options = CorrelationOptionsBuilder::new()
                .estimator_name("ls")
                .weights(weights)
                .build();
            let name = if weights { "weighted" } else { "unweighted" };
            group.bench_with_input(BenchmarkId::new(name, n_points), &options, |b, options| {
                b.iter(|| {
                    compute_correlation(&data, RandomSource::Catalog(&random), &bin_edges, options)
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
