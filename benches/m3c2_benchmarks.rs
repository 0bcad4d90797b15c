//! Benchmarks for the M3C2 distance engine
//!
//! Compares the reference strategies against the optimized ones

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use m3c2_native::core::{GeometricParams, M3C2Params, Point};
use m3c2_native::distance::{fallback, CylinderWorkingSetFinder, WorkingSetFinder, M3C2};
use m3c2_native::Epoch;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Synthetic terrain over a square of side `extent`, one point per unit area.
fn create_epoch(seed: u64, extent: f64, lift: f64) -> Epoch {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = (extent * extent) as usize;
    let points: Vec<Point> = (0..n)
        .map(|_| {
            let x: f64 = rng.gen_range(0.0..extent);
            let y: f64 = rng.gen_range(0.0..extent);
            Point::new(x, y, 0.5 * (x * 0.2).sin() + lift + rng.gen_range(-0.05..0.05))
        })
        .collect();
    Epoch::new(points)
}

fn benchmark_cylinder_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("cylinder_search");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    let epoch = create_epoch(1, 200.0, 0.0);
    epoch.build_kdtree(10).unwrap();
    let core = Point::new(100.0, 100.0, 0.0);
    let up = Vector3::z();

    // Long cylinders are where the chained balls pay off
    for max_distance in [2.0, 8.0, 32.0] {
        let geom = GeometricParams::new(1.0, max_distance).unwrap();

        group.bench_with_input(
            BenchmarkId::new("enclosing_ball", max_distance),
            &geom,
            |b, geom| {
                b.iter(|| {
                    fallback::cylinder_workingset_finder(&epoch, black_box(&core), &up, geom)
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("chained_balls", max_distance),
            &geom,
            |b, geom| {
                b.iter(|| CylinderWorkingSetFinder.find(&epoch, black_box(&core), &up, geom));
            },
        );
    }

    group.finish();
}

fn benchmark_m3c2_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("m3c2_run");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for extent in [50.0, 100.0] {
        let epoch1 = create_epoch(2, extent, 0.0);
        let epoch2 = create_epoch(3, extent, 0.3);
        let corepoints: Vec<Point> = epoch1.cloud().iter().step_by(10).copied().collect();
        let params = M3C2Params::new(3.0, vec![2.0]).with_max_distance(6.0);

        let optimized = M3C2::new(params.clone()).unwrap();
        let reference = M3C2::fallback(params).unwrap();

        group.bench_with_input(
            BenchmarkId::new("optimized", corepoints.len()),
            &corepoints,
            |b, cps| b.iter(|| optimized.run(&epoch1, &epoch2, black_box(cps))),
        );
        group.bench_with_input(
            BenchmarkId::new("fallback", corepoints.len()),
            &corepoints,
            |b, cps| b.iter(|| reference.run(&epoch1, &epoch2, black_box(cps))),
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_cylinder_search, benchmark_m3c2_run);
criterion_main!(benches);
