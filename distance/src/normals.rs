//! Multiscale normal directions
//!
//! For every core point a plane is fitted by PCA at each candidate radius; the
//! normal of the flattest fit (lowest surface variation) is kept and oriented
//! towards a reference direction.

use m3c2_core::{ensure_positive, unit_direction, Direction, Error, Point, Result};
use m3c2_spatial::{Epoch, KDTree};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rayon::prelude::*;

/// Normal chosen for one core point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiscaleDirection {
    pub normal: Direction,
    /// Radius the normal was estimated at; `None` when no radius gathered
    /// enough points and the orientation vector was used instead.
    pub radius: Option<f64>,
}

/// Estimate normals of `epoch` at each core point over several scales.
pub fn compute_multiscale_directions(
    epoch: &Epoch,
    corepoints: &[Point],
    normal_radii: &[f64],
    orientation: &Direction,
) -> Result<Vec<MultiscaleDirection>> {
    if normal_radii.is_empty() {
        return Err(Error::invalid_parameter(
            "at least one normal radius is required",
        ));
    }
    for &r in normal_radii {
        ensure_positive("normal radius", r)?;
    }
    let orientation = unit_direction(orientation)?;
    let max_radius = normal_radii.iter().copied().fold(0.0, f64::max);
    let tree = epoch.neighborhoods(corepoints, max_radius)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "Estimating normals at {} core points over {} radii",
        corepoints.len(),
        normal_radii.len()
    );

    (0..corepoints.len())
        .into_par_iter()
        .map(|query_index| best_direction(&tree, query_index, normal_radii, &orientation))
        .collect()
}

fn best_direction(
    tree: &KDTree,
    query_index: usize,
    normal_radii: &[f64],
    orientation: &Direction,
) -> Result<MultiscaleDirection> {
    let mut best: Option<(f64, Direction, f64)> = None;
    for &radius in normal_radii {
        let mut neighbors = tree.precomputed_radius_search(query_index, radius)?;
        neighbors.sort_unstable();
        let Some((normal, variation)) = fit_plane(tree.cloud(), &neighbors) else {
            continue;
        };
        if best.map_or(true, |(v, _, _)| variation < v) {
            best = Some((variation, normal, radius));
        }
    }

    Ok(match best {
        Some((_, normal, radius)) => MultiscaleDirection {
            normal: if normal.dot(orientation) < 0.0 {
                -normal
            } else {
                normal
            },
            radius: Some(radius),
        },
        None => MultiscaleDirection {
            normal: *orientation,
            radius: None,
        },
    })
}

/// Fit a plane through the points `indices` of `cloud`.
///
/// Returns the unit normal and the surface variation `l_min / (l0 + l1 + l2)`
/// of the covariance eigenvalues. `None` for fewer than 3 points or when all
/// points coincide.
pub fn fit_plane(cloud: &[Point], indices: &[usize]) -> Option<(Direction, f64)> {
    if indices.len() < 3 {
        return None;
    }

    // Compute centroid
    let mut centroid = Vector3::zeros();
    for &i in indices {
        centroid += cloud[i].coords;
    }
    centroid /= indices.len() as f64;

    // Compute covariance matrix
    let mut cov = Matrix3::zeros();
    for &i in indices {
        let d = cloud[i].coords - centroid;
        cov += d * d.transpose();
    }
    cov /= indices.len() as f64;

    let eigen = SymmetricEigen::new(cov);

    // Find index of smallest eigenvalue explicitly
    let mut min_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }

    let total: f64 = eigen.eigenvalues.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let variation = eigen.eigenvalues[min_idx].max(0.0) / total;
    let normal = eigen.eigenvectors.column(min_idx).normalize();
    Some((normal, variation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilted_plane(n: usize) -> Vec<Point> {
        let mut points = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let (x, y) = (x as f64 * 0.5, y as f64 * 0.5);
                points.push(Point::new(x, y, 0.5 * x));
            }
        }
        points
    }

    #[test]
    fn test_fit_plane() {
        let cloud = tilted_plane(6);
        let indices: Vec<usize> = (0..cloud.len()).collect();
        let (normal, variation) = fit_plane(&cloud, &indices).unwrap();

        let expected = Vector3::new(-0.5, 0.0, 1.0).normalize();
        assert!(normal.dot(&expected).abs() > 1.0 - 1e-9);
        assert!(variation < 1e-12);

        assert!(fit_plane(&cloud, &indices[..2]).is_none());
        let same = vec![Point::new(1.0, 1.0, 1.0); 5];
        assert!(fit_plane(&same, &[0, 1, 2, 3, 4]).is_none());
    }

    #[test]
    fn test_multiscale_orientation() {
        let epoch = Epoch::new(tilted_plane(10));
        let corepoints = vec![Point::new(2.0, 2.0, 1.0)];

        let up = compute_multiscale_directions(&epoch, &corepoints, &[1.0, 2.0], &Vector3::z())
            .unwrap();
        assert_eq!(up.len(), 1);
        assert!(up[0].normal.z > 0.0);
        assert!((up[0].normal.norm() - 1.0).abs() < 1e-9);
        assert!(up[0].radius.is_some());

        let down = compute_multiscale_directions(&epoch, &corepoints, &[1.0], &-Vector3::z())
            .unwrap();
        assert!(down[0].normal.z < 0.0);
    }

    #[test]
    fn test_multiscale_prefers_flattest_radius() {
        // A flat patch with a spike ring: the small radius sees only the patch.
        let mut points = Vec::new();
        for y in -3..=3 {
            for x in -3..=3 {
                points.push(Point::new(x as f64 * 0.25, y as f64 * 0.25, 0.0));
            }
        }
        for a in 0..12 {
            let angle = a as f64 * std::f64::consts::PI / 6.0;
            points.push(Point::new(3.0 * angle.cos(), 3.0 * angle.sin(), 1.5 * (a % 2) as f64));
        }
        let epoch = Epoch::new(points);
        let dirs =
            compute_multiscale_directions(&epoch, &[Point::origin()], &[4.0, 1.0], &Vector3::z())
                .unwrap();
        assert_eq!(dirs[0].radius, Some(1.0));
        assert!(dirs[0].normal.z > 1.0 - 1e-9);
    }

    #[test]
    fn test_cached_neighborhoods_match_direct_search() {
        let epoch = Epoch::new(tilted_plane(12));
        let corepoints = vec![Point::new(1.0, 1.0, 0.5), Point::new(3.0, 2.5, 1.5)];
        let dirs =
            compute_multiscale_directions(&epoch, &corepoints, &[0.6, 1.2, 2.5], &Vector3::z())
                .unwrap();

        for (corepoint, dir) in corepoints.iter().zip(&dirs) {
            let radius = dir.radius.unwrap();
            let mut indices = epoch.kdtree().unwrap().radius_search(corepoint, radius).unwrap();
            indices.sort_unstable();
            let (normal, _) = fit_plane(epoch.cloud(), &indices).unwrap();
            assert!(normal.dot(&dir.normal).abs() > 1.0 - 1e-12);
        }
    }

    #[test]
    fn test_sparse_neighbourhood_falls_back_to_orientation() {
        let epoch = Epoch::from_xyz(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]]);
        let orientation = Vector3::new(0.0, 2.0, 0.0);
        let dirs =
            compute_multiscale_directions(&epoch, &[Point::origin()], &[1.0], &orientation).unwrap();
        assert_eq!(dirs[0].radius, None);
        assert_eq!(dirs[0].normal, Vector3::y());
    }

    #[test]
    fn test_invalid_arguments() {
        let epoch = Epoch::new(tilted_plane(3));
        let cps = [Point::origin()];
        assert!(matches!(
            compute_multiscale_directions(&epoch, &cps, &[], &Vector3::z()),
            Err(Error::InvalidParameter(_))
        ));
        assert!(compute_multiscale_directions(&epoch, &cps, &[0.0], &Vector3::z()).is_err());
        assert!(matches!(
            compute_multiscale_directions(&epoch, &cps, &[1.0], &Vector3::zeros()),
            Err(Error::InvalidDirection(_))
        ));
    }
}
