//! Distance uncertainty estimation
//!
//! The uncertainty of an M3C2 distance combines the roughness of both working
//! sets (sample standard deviation of their axial offsets), their point counts
//! and the registration error of the epochs:
//!
//! ```text
//! sigma = sqrt(s1^2 / n1 + s2^2 / n2 + reg^2)
//! lodetection = confidence * sigma
//! ```

use crate::WorkingSet;
use m3c2_core::{RegistrationError, Result, DEFAULT_CONFIDENCE};

/// Uncertainty of one distance plus the per-epoch statistics behind it.
///
/// `None` marks a value that cannot be computed from the data at hand, e.g.
/// the spread of a working set with fewer than two points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DistanceUncertainty {
    pub uncertainty: Option<f64>,
    /// Level of detection: smallest distance distinguishable from noise.
    pub lodetection: Option<f64>,
    pub spread1: Option<f64>,
    pub num_samples1: usize,
    pub spread2: Option<f64>,
    pub num_samples2: usize,
}

impl DistanceUncertainty {
    /// Nothing computable beyond the point counts.
    pub fn undefined(num_samples1: usize, num_samples2: usize) -> Self {
        Self {
            num_samples1,
            num_samples2,
            ..Self::default()
        }
    }

    pub fn is_defined(&self) -> bool {
        self.uncertainty.is_some()
    }
}

/// Strategy estimating the uncertainty of the distance between two working sets.
///
/// Implemented for any `Fn(&WorkingSet, &WorkingSet, &RegistrationError)`
/// closure.
pub trait UncertaintyCalculator: Send + Sync {
    fn calculate(
        &self,
        set1: &WorkingSet,
        set2: &WorkingSet,
        registration: &RegistrationError,
    ) -> Result<DistanceUncertainty>;
}

impl<F> UncertaintyCalculator for F
where
    F: Fn(&WorkingSet, &WorkingSet, &RegistrationError) -> Result<DistanceUncertainty>
        + Send
        + Sync,
{
    fn calculate(
        &self,
        set1: &WorkingSet,
        set2: &WorkingSet,
        registration: &RegistrationError,
    ) -> Result<DistanceUncertainty> {
        self(set1, set2, registration)
    }
}

/// Propagate per-epoch roughness, point counts and registration error into
/// the standard deviation of the distance.
///
/// Undefined when either spread is undefined or either set is empty.
pub fn propagate_uncertainty(
    spread1: Option<f64>,
    num_samples1: usize,
    spread2: Option<f64>,
    num_samples2: usize,
    registration_error: f64,
) -> Option<f64> {
    let (s1, s2) = (spread1?, spread2?);
    if num_samples1 == 0 || num_samples2 == 0 {
        return None;
    }
    let variance = s1 * s1 / num_samples1 as f64
        + s2 * s2 / num_samples2 as f64
        + registration_error * registration_error;
    Some(variance.sqrt())
}

/// Skip uncertainty estimation entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUncertainty;

impl UncertaintyCalculator for NoUncertainty {
    fn calculate(
        &self,
        _set1: &WorkingSet,
        _set2: &WorkingSet,
        _registration: &RegistrationError,
    ) -> Result<DistanceUncertainty> {
        Ok(DistanceUncertainty::default())
    }
}

/// Roughness-based uncertainty with single-pass statistics.
#[derive(Debug, Clone, Copy)]
pub struct StandardDeviationUncertainty {
    pub confidence: f64,
}

impl Default for StandardDeviationUncertainty {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl StandardDeviationUncertainty {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl UncertaintyCalculator for StandardDeviationUncertainty {
    fn calculate(
        &self,
        set1: &WorkingSet,
        set2: &WorkingSet,
        registration: &RegistrationError,
    ) -> Result<DistanceUncertainty> {
        set1.validate()?;
        set2.validate()?;
        registration.validate()?;

        let stats1 = RunningStats::from_values(&set1.axial_offsets);
        let stats2 = RunningStats::from_values(&set2.axial_offsets);
        let (spread1, spread2) = (stats1.spread(), stats2.spread());

        let uncertainty = propagate_uncertainty(
            spread1,
            stats1.count,
            spread2,
            stats2.count,
            registration.combined(),
        );
        Ok(DistanceUncertainty {
            uncertainty,
            lodetection: uncertainty.map(|u| self.confidence * u),
            spread1,
            num_samples1: stats1.count,
            spread2,
            num_samples2: stats2.count,
        })
    }
}

/// Welford accumulator for mean and variance.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn from_values(values: &[f64]) -> Self {
        let mut stats = Self::default();
        for &v in values {
            stats.push(v);
        }
        stats
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Sample standard deviation, undefined below two values.
    fn spread(&self) -> Option<f64> {
        (self.count >= 2).then(|| (self.m2 / (self.count - 1) as f64).sqrt())
    }
}
