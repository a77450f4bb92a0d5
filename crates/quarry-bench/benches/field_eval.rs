//! Criterion benchmarks for field evaluation on datasets.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use quarry_bench::{profile_fields, reference_profile, stress_profile};
use quarry_core::{FieldContext, FieldKey};
use quarry_test_utils::get_params;

fn bench_all_data(c: &mut Criterion) {
    let ds = reference_profile(42);
    let mut group = c.benchmark_group("all_data_32");
    for key in profile_fields() {
        group.bench_function(key.to_string(), |b| {
            b.iter_batched(
                || {
                    let mut all = ds.all_data();
                    for (name, value) in get_params() {
                        all.set_parameter(name, value);
                    }
                    all
                },
                |mut all| black_box(all.get(&key).unwrap()),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_ghost_zone_retry(c: &mut Criterion) {
    let ds = reference_profile(42);
    let key = FieldKey::new("gas", "smoothed_density");
    c.bench_function("grid_smoothed_density_retry", |b| {
        b.iter_batched(
            || ds.grid(0).unwrap(),
            |mut grid| black_box(grid.get(&key).unwrap()),
            BatchSize::SmallInput,
        );
    });
}

fn bench_cached_read(c: &mut Criterion) {
    let ds = reference_profile(42);
    let mut all = ds.all_data();
    let key = FieldKey::new("gas", "mach_number");
    all.get(&key).unwrap();
    c.bench_function("all_data_cached_read", |b| {
        b.iter(|| black_box(all.get(&key).unwrap()));
    });
}

fn bench_stress(c: &mut Criterion) {
    let ds = stress_profile(7);
    let key = FieldKey::new("gas", "pressure");
    let mut group = c.benchmark_group("stress_64");
    group.sample_size(10);
    group.bench_function("pressure", |b| {
        b.iter_batched(
            || ds.all_data(),
            |mut all| black_box(all.get(&key).unwrap()),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_all_data,
    bench_ghost_zone_retry,
    bench_cached_read,
    bench_stress
);
criterion_main!(benches);
