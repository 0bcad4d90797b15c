//! M3C2 point cloud distance computation
//!
//! This crate provides the per-core-point machinery of the Multiscale
//! Model-to-Model Cloud Comparison:
//! - [`workingset`]: radius and cylinder working-set finders
//! - [`uncertainty`]: distance uncertainty / level-of-detection estimation
//! - [`fallback`]: straightforward reference implementations of both
//! - [`normals`]: multiscale normal directions at the core points
//! - [`m3c2`]: the [`M3C2`] engine running everything in parallel
//!
//! Working-set finders and uncertainty calculators are strategies: any type
//! (or closure) implementing [`WorkingSetFinder`] / [`UncertaintyCalculator`]
//! can be plugged into [`M3C2`] without changing how a run proceeds.

pub mod fallback;
pub mod m3c2;
pub mod normals;
pub mod uncertainty;
pub mod workingset;

pub use m3c2::{DistanceResult, M3C2};
pub use normals::{compute_multiscale_directions, fit_plane, MultiscaleDirection};
pub use uncertainty::{
    propagate_uncertainty, DistanceUncertainty, NoUncertainty, StandardDeviationUncertainty,
    UncertaintyCalculator,
};
pub use workingset::{
    cylinder_offset, CylinderWorkingSetFinder, RadiusWorkingSetFinder, WorkingSet,
    WorkingSetFinder,
};

pub use m3c2_core::{Error, Result};
