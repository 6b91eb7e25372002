use bucket_map::BucketMap;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("bucket_map_insert_10k", |b| {
        b.iter_batched(
            BucketMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_presized(c: &mut Criterion) {
    c.bench_function("bucket_map_insert_10k_presized", |b| {
        b.iter_batched(
            || BucketMap::<u64, u64>::with_capacity(10_000),
            |mut m| {
                for (i, x) in lcg(3).take(10_000).enumerate() {
                    m.insert(x, i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("bucket_map_get_hit", |b| {
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        let m: BucketMap<String, u64> = keys
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, k)| (k, i as u64))
            .collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k).unwrap());
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("bucket_map_get_miss", |b| {
        let mut m = BucketMap::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.insert(key(x), i as u64);
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.get(&k));
        })
    });
}

fn bench_churn(c: &mut Criterion) {
    // Steady size with constant turnover: exercises slot reuse and
    // same-size growth.
    c.bench_function("bucket_map_churn", |b| {
        let mut m = BucketMap::<u64, u64>::with_capacity(4096);
        let mut next = 0u64;
        for _ in 0..4096 {
            m.insert(next, next);
            next += 1;
        }
        b.iter(|| {
            m.insert(next, next);
            black_box(m.remove(&(next - 4096)));
            next += 1;
        })
    });
}

fn bench_iterate(c: &mut Criterion) {
    c.bench_function("bucket_map_iter_10k", |b| {
        let m: BucketMap<u64, u64> = lcg(5).take(10_000).map(|x| (x, x)).collect();
        b.iter(|| black_box(m.values().fold(0u64, |a, v| a.wrapping_add(*v))))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_insert_presized, bench_get_hit, bench_get_miss, bench_churn, bench_iterate
}
criterion_main!(benches);
