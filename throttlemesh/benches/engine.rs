use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use throttlemesh::{MemoryStore, Rate, RateLimiter};

fn benchmark_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("gcra_engine");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("single_key_allowed", |b| {
        let store = MemoryStore::builder().capacity(1_000).build();
        let mut limiter = RateLimiter::new(store, Rate::per_second(1_000_000), 1_000_000);

        b.iter(|| {
            let (limited, _result) = limiter.limit(black_box("bench_key"), black_box(1)).unwrap();
            black_box(limited)
        });
    });

    group.bench_function("rotating_keys_100", |b| {
        let store = MemoryStore::builder().capacity(1_000).build();
        let mut limiter = RateLimiter::new(store, Rate::per_second(10_000), 100);
        let mut counter = 0u64;

        b.iter(|| {
            let key = format!("key_{}", counter % 100);
            counter += 1;

            let (limited, _result) = limiter.limit(black_box(&key), black_box(1)).unwrap();
            black_box(limited)
        });
    });

    group.bench_function("single_key_rejected", |b| {
        let store = MemoryStore::builder().capacity(1_000).build();
        // One request per hour with no burst: everything after the first
        // request exercises the rejection path, which never writes.
        let mut limiter = RateLimiter::new(store, Rate::per_hour(1), 0);
        limiter.limit("bench_key", 1).unwrap();

        b.iter(|| {
            let (limited, _result) = limiter.limit(black_box("bench_key"), black_box(1)).unwrap();
            black_box(limited)
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_engine);
criterion_main!(benches);
