//! M3C2 distance engine
//!
//! For every core point:
//! 1. take the normal direction (estimated upstream or by [`M3C2::directions`])
//! 2. select a working set in each epoch with the configured [`WorkingSetFinder`]
//! 3. if both sets are non-empty, take the difference of their mean axial
//!    offsets as the distance (epoch 2 minus epoch 1)
//! 4. estimate its uncertainty with the configured [`UncertaintyCalculator`]
//!
//! Core points are processed in parallel chunks. The first error or panic
//! raised by a strategy stops the run: no further core points are started,
//! and that exact error is returned to the caller (a panic is resumed on the
//! calling thread with its original payload).

use crate::{
    compute_multiscale_directions, fallback, CylinderWorkingSetFinder, DistanceUncertainty,
    MultiscaleDirection, StandardDeviationUncertainty, UncertaintyCalculator, WorkingSetFinder,
};
use m3c2_core::{
    Direction, Error, GeometricParams, M3C2Params, Point, RegistrationError, Result,
};
use m3c2_spatial::Epoch;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome of the comparison at one core point.
///
/// `distance` is `None` when either working set came back empty.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceResult {
    pub distance: Option<f64>,
    pub uncertainty: DistanceUncertainty,
}

impl DistanceResult {
    pub fn undefined(num_samples1: usize, num_samples2: usize) -> Self {
        Self {
            distance: None,
            uncertainty: DistanceUncertainty::undefined(num_samples1, num_samples2),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.distance.is_some()
    }
}

/// First failure raised inside a worker.
enum Failure {
    Error(Error),
    Panic(Box<dyn Any + Send>),
}

/// Multiscale Model-to-Model Cloud Comparison.
///
/// ```ignore
/// let params = M3C2Params::new(3.0, vec![2.0]).with_max_distance(6.0);
/// let m3c2 = M3C2::new(params)?.with_workingset_finder(RadiusWorkingSetFinder);
/// let results = m3c2.run(&epoch1, &epoch2, &corepoints)?;
/// ```
#[derive(Clone)]
pub struct M3C2 {
    params: M3C2Params,
    workingset_finder: Arc<dyn WorkingSetFinder>,
    uncertainty_calculator: Arc<dyn UncertaintyCalculator>,
    thread_pool: Option<Arc<ThreadPool>>,
}

impl std::fmt::Debug for M3C2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("M3C2")
            .field("params", &self.params)
            .field("thread_pool", &self.thread_pool.is_some())
            .finish_non_exhaustive()
    }
}

impl M3C2 {
    /// Engine using the chained-ball cylinder search and single-pass
    /// standard-deviation uncertainty.
    pub fn new(params: M3C2Params) -> Result<Self> {
        params.validate()?;
        let confidence = params.confidence;
        Ok(Self {
            params,
            workingset_finder: Arc::new(CylinderWorkingSetFinder),
            uncertainty_calculator: Arc::new(StandardDeviationUncertainty::new(confidence)),
            thread_pool: None,
        })
    }

    /// Engine using the reference strategies from [`fallback`].
    pub fn fallback(params: M3C2Params) -> Result<Self> {
        Ok(Self::new(params)?
            .with_workingset_finder(fallback::cylinder_workingset_finder)
            .with_uncertainty_calculator(fallback::standard_deviation_uncertainty))
    }

    pub fn with_workingset_finder(mut self, finder: impl WorkingSetFinder + 'static) -> Self {
        self.workingset_finder = Arc::new(finder);
        self
    }

    pub fn with_uncertainty_calculator(
        mut self,
        calculator: impl UncertaintyCalculator + 'static,
    ) -> Self {
        self.uncertainty_calculator = Arc::new(calculator);
        self
    }

    /// Run on a dedicated pool instead of the global Rayon pool.
    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.thread_pool = Some(pool);
        self
    }

    pub fn params(&self) -> &M3C2Params {
        &self.params
    }

    /// Multiscale normals of `epoch` at the core points.
    pub fn directions(&self, epoch: &Epoch, corepoints: &[Point]) -> Result<Vec<MultiscaleDirection>> {
        epoch.build_kdtree(self.params.leaf_size)?;
        self.install(|| {
            compute_multiscale_directions(
                epoch,
                corepoints,
                &self.params.normal_radii,
                &self.params.orientation,
            )
        })
    }

    /// Compare two epochs at the core points, with normals estimated from
    /// the first epoch.
    pub fn run(
        &self,
        epoch1: &Epoch,
        epoch2: &Epoch,
        corepoints: &[Point],
    ) -> Result<Vec<DistanceResult>> {
        let directions: Vec<Direction> = self
            .directions(epoch1, corepoints)?
            .into_iter()
            .map(|d| d.normal)
            .collect();
        self.run_with_directions(epoch1, epoch2, corepoints, &directions)
    }

    /// Compare two epochs at the core points along the given normals.
    ///
    /// Results are positional: `results[i]` belongs to `corepoints[i]`
    /// regardless of which worker computed it.
    pub fn run_with_directions(
        &self,
        epoch1: &Epoch,
        epoch2: &Epoch,
        corepoints: &[Point],
        directions: &[Direction],
    ) -> Result<Vec<DistanceResult>> {
        if corepoints.len() != directions.len() {
            return Err(Error::InvalidInput(format!(
                "{} core points but {} directions",
                corepoints.len(),
                directions.len()
            )));
        }

        // Built up front so workers only ever read the indices.
        epoch1.build_kdtree(self.params.leaf_size)?;
        epoch2.build_kdtree(self.params.leaf_size)?;

        let geometry = self.params.geometry();
        let registration =
            RegistrationError::new(epoch1.registration_error(), epoch2.registration_error());
        let chunk_size = self.params.chunk_size;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Running M3C2 on {} core points ({} / {} epoch points, chunk size {})",
            corepoints.len(),
            epoch1.len(),
            epoch2.len(),
            chunk_size
        );

        let abort = AtomicBool::new(false);
        let failure: Mutex<Option<Failure>> = Mutex::new(None);
        let mut results = vec![DistanceResult::default(); corepoints.len()];

        self.install(|| {
            results
                .par_chunks_mut(chunk_size)
                .zip(corepoints.par_chunks(chunk_size))
                .zip(directions.par_chunks(chunk_size))
                .for_each(|((slots, points), normals)| {
                    for ((slot, corepoint), normal) in slots.iter_mut().zip(points).zip(normals) {
                        if abort.load(Ordering::Acquire) {
                            return;
                        }
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            self.compare_at(
                                epoch1,
                                epoch2,
                                corepoint,
                                normal,
                                &geometry,
                                &registration,
                            )
                        }));
                        let failed = match outcome {
                            Ok(Ok(result)) => {
                                *slot = result;
                                continue;
                            }
                            Ok(Err(err)) => Failure::Error(err),
                            Err(payload) => Failure::Panic(payload),
                        };
                        abort.store(true, Ordering::Release);
                        // Only the first failure is kept.
                        let mut first = failure.lock().unwrap_or_else(PoisonError::into_inner);
                        if first.is_none() {
                            *first = Some(failed);
                        }
                        return;
                    }
                });
        });

        match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(Failure::Error(err)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("M3C2 run aborted: {}", err);
                return Err(err);
            }
            Some(Failure::Panic(payload)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("M3C2 run aborted by a panicking strategy");
                panic::resume_unwind(payload);
            }
            None => {}
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "M3C2 finished: {} of {} distances defined",
            results.iter().filter(|r| r.is_defined()).count(),
            results.len()
        );

        Ok(results)
    }

    fn compare_at(
        &self,
        epoch1: &Epoch,
        epoch2: &Epoch,
        corepoint: &Point,
        direction: &Direction,
        geometry: &GeometricParams,
        registration: &RegistrationError,
    ) -> Result<DistanceResult> {
        let set1 = self
            .workingset_finder
            .find(epoch1, corepoint, direction, geometry)?;
        let set2 = self
            .workingset_finder
            .find(epoch2, corepoint, direction, geometry)?;

        let (Some(mean1), Some(mean2)) = (set1.mean_axial_offset(), set2.mean_axial_offset())
        else {
            return Ok(DistanceResult::undefined(set1.len(), set2.len()));
        };

        let uncertainty = self
            .uncertainty_calculator
            .calculate(&set1, &set2, registration)?;
        Ok(DistanceResult {
            distance: Some(mean2 - mean1),
            uncertainty,
        })
    }

    fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.thread_pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}
