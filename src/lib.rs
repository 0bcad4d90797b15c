//! Multiscale Model-to-Model Cloud Comparison (M3C2)
//!
//! Surface change between two point cloud epochs, measured along local
//! normals at a set of core points, with a per-point uncertainty.
//!
//! ```ignore
//! use m3c2_native::{distance::M3C2, spatial::Epoch, core::M3C2Params};
//!
//! let params = M3C2Params::new(3.0, vec![2.0]).with_max_distance(6.0);
//! let results = M3C2::new(params)?.run(&epoch1, &epoch2, epoch1.cloud())?;
//! ```

pub use m3c2_core as core;
pub use m3c2_distance as distance;
pub use m3c2_spatial as spatial;

pub use m3c2_core::{Error, M3C2Params, Result};
pub use m3c2_distance::{DistanceResult, M3C2};
pub use m3c2_spatial::Epoch;

/// Size the global Rayon pool before the first comparison.
///
/// See [`core::init_global_thread_pool`]: an explicit count wins over the
/// `M3C2_CPU_THREADS` variable, and only the first call takes effect.
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<()> {
    m3c2_core::init_global_thread_pool(num_threads)
}
