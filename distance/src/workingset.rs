//! Working-set finders
//!
//! A working set is the part of an epoch considered for one core point. The
//! radius finder takes every point of a ball around the core point; the
//! cylinder finder takes the points of a closed cylinder whose axis runs along
//! the core point's normal.

use m3c2_core::{ensure_positive, unit_direction, Direction, Error, GeometricParams, Point, Result};
use m3c2_spatial::Epoch;

/// Points of one epoch selected for one core point.
///
/// `indices` refer into the epoch's cloud and are kept in increasing order;
/// `axial_offsets[i]` is the signed offset of point `indices[i]` along the
/// search direction, measured from the core point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    pub indices: Vec<usize>,
    pub axial_offsets: Vec<f64>,
}

impl WorkingSet {
    pub fn new(indices: Vec<usize>, axial_offsets: Vec<f64>) -> Result<Self> {
        let set = Self {
            indices,
            axial_offsets,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a working set from point indices, projecting each point onto the
    /// unit direction `direction` through `corepoint`.
    pub fn from_indices(
        cloud: &[Point],
        mut indices: Vec<usize>,
        corepoint: &Point,
        direction: &Direction,
    ) -> Self {
        indices.sort_unstable();
        let axial_offsets = indices
            .iter()
            .map(|&i| (cloud[i] - corepoint).dot(direction))
            .collect();
        Self {
            indices,
            axial_offsets,
        }
    }

    /// Build a working set from `(index, axial offset)` pairs in any order.
    pub fn from_offsets(mut entries: Vec<(usize, f64)>) -> Self {
        entries.sort_unstable_by_key(|&(i, _)| i);
        let (indices, axial_offsets) = entries.into_iter().unzip();
        Self {
            indices,
            axial_offsets,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Mean position along the search direction, `None` for an empty set.
    pub fn mean_axial_offset(&self) -> Option<f64> {
        if self.axial_offsets.is_empty() {
            return None;
        }
        let sum: f64 = self.axial_offsets.iter().sum();
        Some(sum / self.axial_offsets.len() as f64)
    }

    pub fn points<'a>(&'a self, epoch: &'a Epoch) -> impl Iterator<Item = &'a Point> + 'a {
        self.indices.iter().map(move |&i| &epoch.cloud()[i])
    }

    /// Reject sets whose offsets do not line up with their indices.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() != self.axial_offsets.len() {
            return Err(Error::InvalidInput(format!(
                "working set has {} indices but {} axial offsets",
                self.indices.len(),
                self.axial_offsets.len()
            )));
        }
        if let Some(bad) = self.axial_offsets.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "working set contains a non-finite axial offset ({bad})"
            )));
        }
        Ok(())
    }
}

/// Strategy selecting the working set of one epoch for one core point.
///
/// Implemented for any `Fn(&Epoch, &Point, &Direction, &GeometricParams)`
/// closure, so ad-hoc finders need no wrapper type.
pub trait WorkingSetFinder: Send + Sync {
    fn find(
        &self,
        epoch: &Epoch,
        corepoint: &Point,
        direction: &Direction,
        geometry: &GeometricParams,
    ) -> Result<WorkingSet>;
}

impl<F> WorkingSetFinder for F
where
    F: Fn(&Epoch, &Point, &Direction, &GeometricParams) -> Result<WorkingSet> + Send + Sync,
{
    fn find(
        &self,
        epoch: &Epoch,
        corepoint: &Point,
        direction: &Direction,
        geometry: &GeometricParams,
    ) -> Result<WorkingSet> {
        self(epoch, corepoint, direction, geometry)
    }
}

/// Axial offset of `point` if it lies inside the closed cylinder of
/// `geometry` around `corepoint`; `direction` must be unit length.
pub fn cylinder_offset(
    point: &Point,
    corepoint: &Point,
    direction: &Direction,
    geometry: &GeometricParams,
) -> Option<f64> {
    let offset = point - corepoint;
    let axial = offset.dot(direction);
    let radial = (offset - direction * axial).norm();
    (radial <= geometry.radius && axial.abs() <= geometry.max_distance).then_some(axial)
}

/// Ball query through the epoch's KD-tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct RadiusWorkingSetFinder;

impl WorkingSetFinder for RadiusWorkingSetFinder {
    fn find(
        &self,
        epoch: &Epoch,
        corepoint: &Point,
        direction: &Direction,
        geometry: &GeometricParams,
    ) -> Result<WorkingSet> {
        let radius = ensure_positive("radius", geometry.radius)?;
        let direction = unit_direction(direction)?;
        let indices = epoch.kdtree()?.radius_search(corepoint, radius)?;
        Ok(WorkingSet::from_indices(
            epoch.cloud(),
            indices,
            corepoint,
            &direction,
        ))
    }
}

/// Cylinder query assembled from a chain of ball queries along the axis.
///
/// Long, thin cylinders waste most of a single enclosing ball, so the axis is
/// cut into segments no longer than the cylinder diameter and each segment is
/// covered by its own ball.
#[derive(Debug, Clone, Copy, Default)]
pub struct CylinderWorkingSetFinder;

/// Relative padding of the segment balls. Membership is decided by
/// [`cylinder_offset`], so the padding only keeps rounding from dropping
/// candidates on the boundary.
pub(crate) const BALL_PADDING: f64 = 1.0 + 1e-9;

impl WorkingSetFinder for CylinderWorkingSetFinder {
    fn find(
        &self,
        epoch: &Epoch,
        corepoint: &Point,
        direction: &Direction,
        geometry: &GeometricParams,
    ) -> Result<WorkingSet> {
        geometry.validate()?;
        let direction = unit_direction(direction)?;
        let tree = epoch.kdtree()?;

        let segments = (geometry.max_distance / geometry.radius).ceil().max(1.0) as usize;
        let half_segment = geometry.max_distance / segments as f64;
        let ball_radius = half_segment.hypot(geometry.radius) * BALL_PADDING;

        let mut candidates = Vec::new();
        for s in 0..segments {
            let along = -geometry.max_distance + (2 * s + 1) as f64 * half_segment;
            let center = corepoint + direction * along;
            candidates.extend(tree.radius_search(&center, ball_radius)?);
        }
        candidates.sort_unstable();
        candidates.dedup();

        let cloud = epoch.cloud();
        let entries = candidates
            .into_iter()
            .filter_map(|i| {
                cylinder_offset(&cloud[i], corepoint, &direction, geometry).map(|axial| (i, axial))
            })
            .collect();
        Ok(WorkingSet::from_offsets(entries))
    }
}
