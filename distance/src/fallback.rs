//! Reference implementations of the M3C2 strategies.
//!
//! These follow the textbook definitions as directly as possible: a linear
//! scan for the radius search, one enclosing ball for the cylinder search and
//! two-pass statistics for the uncertainty. They are slower than the default
//! strategies and serve to cross-check them; all of them plug into
//! [`M3C2`](crate::M3C2) as plain functions.

use crate::workingset::BALL_PADDING;
use crate::{cylinder_offset, propagate_uncertainty, DistanceUncertainty, WorkingSet};
use m3c2_core::{
    ensure_positive, unit_direction, Direction, GeometricParams, Point, RegistrationError, Result,
    DEFAULT_CONFIDENCE,
};
use m3c2_spatial::Epoch;

/// All epoch points within `geometry.radius` of the core point, by linear scan.
pub fn radius_workingset_finder(
    epoch: &Epoch,
    corepoint: &Point,
    direction: &Direction,
    geometry: &GeometricParams,
) -> Result<WorkingSet> {
    let radius = ensure_positive("radius", geometry.radius)?;
    let direction = unit_direction(direction)?;
    let radius_sq = radius * radius;

    let indices = epoch
        .cloud()
        .iter()
        .enumerate()
        .filter(|(_, p)| (*p - corepoint).norm_squared() <= radius_sq)
        .map(|(i, _)| i)
        .collect();
    Ok(WorkingSet::from_indices(
        epoch.cloud(),
        indices,
        corepoint,
        &direction,
    ))
}

/// Epoch points inside the closed cylinder around the core point: one ball
/// query of radius `sqrt(r^2 + L^2)`, then the radial and axial bounds.
/// The ball is padded like the segment balls of
/// [`CylinderWorkingSetFinder`](crate::CylinderWorkingSetFinder) so points on
/// the rim of a cap survive rounding.
pub fn cylinder_workingset_finder(
    epoch: &Epoch,
    corepoint: &Point,
    direction: &Direction,
    geometry: &GeometricParams,
) -> Result<WorkingSet> {
    geometry.validate()?;
    let direction = unit_direction(direction)?;

    let candidates = epoch
        .kdtree()?
        .radius_search(corepoint, geometry.enclosing_radius() * BALL_PADDING)?;
    let cloud = epoch.cloud();
    let entries = candidates
        .into_iter()
        .filter_map(|i| {
            cylinder_offset(&cloud[i], corepoint, &direction, geometry).map(|axial| (i, axial))
        })
        .collect();
    Ok(WorkingSet::from_offsets(entries))
}

/// No uncertainty at all.
pub fn no_uncertainty(
    _set1: &WorkingSet,
    _set2: &WorkingSet,
    _registration: &RegistrationError,
) -> Result<DistanceUncertainty> {
    Ok(DistanceUncertainty::default())
}

/// Roughness-based uncertainty with two-pass statistics and a 95% level of
/// detection.
pub fn standard_deviation_uncertainty(
    set1: &WorkingSet,
    set2: &WorkingSet,
    registration: &RegistrationError,
) -> Result<DistanceUncertainty> {
    set1.validate()?;
    set2.validate()?;
    registration.validate()?;

    let spread1 = sample_std(&set1.axial_offsets);
    let spread2 = sample_std(&set2.axial_offsets);
    let uncertainty = propagate_uncertainty(
        spread1,
        set1.len(),
        spread2,
        set2.len(),
        registration.combined(),
    );
    Ok(DistanceUncertainty {
        uncertainty,
        lodetection: uncertainty.map(|u| DEFAULT_CONFIDENCE * u),
        spread1,
        num_samples1: set1.len(),
        spread2,
        num_samples2: set2.len(),
    })
}

fn sample_std(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let variance =
        data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    Some(variance.sqrt())
}
