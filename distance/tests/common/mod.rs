#![allow(dead_code)]

use m3c2_core::Point;
use m3c2_distance::DistanceResult;
use m3c2_spatial::Epoch;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Gently undulating terrain over a 10 x 10 square with uniform noise.
pub fn terrain(seed: u64, n: usize, lift: f64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let x: f64 = rng.gen_range(0.0..10.0);
            let y: f64 = rng.gen_range(0.0..10.0);
            let z = 0.3 * x.sin() + 0.2 * y.cos() + lift + rng.gen_range(-0.05..0.05);
            Point::new(x, y, z)
        })
        .collect()
}

/// Two acquisitions of the same terrain, the second raised by 0.5.
pub fn epochs() -> (Epoch, Epoch) {
    (
        Epoch::new(terrain(42, 150, 0.0)),
        Epoch::new(terrain(7, 150, 0.5)),
    )
}

pub fn assert_close(a: Option<f64>, b: Option<f64>, what: &str) {
    match (a, b) {
        (Some(x), Some(y)) => assert!(
            (x - y).abs() <= 1e-9 * (1.0 + x.abs().max(y.abs())),
            "{what}: {x} != {y}"
        ),
        (None, None) => {}
        _ => panic!("{what}: {a:?} vs {b:?}"),
    }
}

/// Results agree up to floating-point tolerance.
pub fn compare_results(lhs: &[DistanceResult], rhs: &[DistanceResult]) {
    assert_eq!(lhs.len(), rhs.len());
    for (i, (l, r)) in lhs.iter().zip(rhs).enumerate() {
        assert_close(l.distance, r.distance, &format!("distance[{i}]"));
        let (lu, ru) = (&l.uncertainty, &r.uncertainty);
        assert_close(lu.uncertainty, ru.uncertainty, &format!("uncertainty[{i}]"));
        assert_close(lu.lodetection, ru.lodetection, &format!("lodetection[{i}]"));
        assert_close(lu.spread1, ru.spread1, &format!("spread1[{i}]"));
        assert_close(lu.spread2, ru.spread2, &format!("spread2[{i}]"));
        assert_eq!(lu.num_samples1, ru.num_samples1, "num_samples1[{i}]");
        assert_eq!(lu.num_samples2, ru.num_samples2, "num_samples2[{i}]");
    }
}
