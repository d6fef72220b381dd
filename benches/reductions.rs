/// Benchmarks for the dedup-aware collective reductions.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use obsdist::comm::Communicator;
use obsdist::config::DistributionConfig;
use obsdist::distribution::create_distribution;

fn criterion_benchmark(c: &mut Criterion) {
    for size_k in [64, 256, 1024] {
        let gnlocs = size_k * 1024;
        let config = DistributionConfig {
            name: "round-robin".to_string(),
            halo: None,
        };
        let mut dist =
            create_distribution(&config, Communicator::serial(), gnlocs, None, None).unwrap();
        dist.finalize().unwrap();
        let missing = f64::MIN;
        let values: Vec<f64> = (0..gnlocs)
            .map(|i| if i % 7 == 0 { missing } else { i as f64 })
            .collect();

        let name = format!("dot_product({})", gnlocs);
        c.bench_function(&name, |b| {
            b.iter(|| dist.dot_product(black_box(&values), black_box(&values)).unwrap())
        });

        let name = format!("global_num_non_missing_obs({})", gnlocs);
        c.bench_function(&name, |b| {
            b.iter(|| dist.global_num_non_missing_obs(black_box(&values)).unwrap())
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
