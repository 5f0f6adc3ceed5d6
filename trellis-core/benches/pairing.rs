//! Benchmarks for keyed-list pairing through the host.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_core::{Host, HostSettings, ManualClock, TargetDef};

fn list(keys: &[i64]) -> TargetDef {
    TargetDef::element("ul").children(
        keys.iter()
            .map(|&k| TargetDef::element("li").key(k).prop("id", k).child(k)),
    )
}

fn host() -> Host {
    Host::with_clock(HostSettings::synchronous(), ManualClock::new()).expect("valid settings")
}

/// Benchmark reversing a keyed list of varying length
fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reverse");

    for n in [10, 100, 1000] {
        let forward: Vec<i64> = (0..n).collect();
        let backward: Vec<i64> = forward.iter().rev().copied().collect();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let host = host();
            host.update_root(list(&forward)).unwrap();
            let mut flip = false;

            b.iter(|| {
                flip = !flip;
                let keys = if flip { &backward } else { &forward };
                host.update_root(black_box(list(keys))).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark rotating one item from the end to the front
fn bench_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_rotate");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let host = host();
            let mut keys: Vec<i64> = (0..n).collect();
            host.update_root(list(&keys)).unwrap();

            b.iter(|| {
                keys.rotate_right(1);
                host.update_root(black_box(list(&keys))).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark re-rendering an unchanged list
fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("steady_state");

    for n in [10, 100, 1000] {
        let keys: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let host = host();
            host.update_root(list(&keys)).unwrap();

            b.iter(|| host.update_root(black_box(list(&keys))).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reverse, bench_rotate, bench_steady_state);
criterion_main!(benches);
