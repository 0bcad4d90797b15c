use crate::{ensure_positive, unit_direction, Direction, Error, GeometricParams, Result};

/// Level-of-detection multiplier for a 95% confidence interval.
pub const DEFAULT_CONFIDENCE: f64 = 1.96;
/// Core points handed to one parallel task.
pub const DEFAULT_CHUNK_SIZE: usize = 64;
/// Points stored per KD-tree leaf bucket.
pub const DEFAULT_LEAF_SIZE: usize = 10;

/// Configuration of an M3C2 run.
#[derive(Debug, Clone, PartialEq)]
pub struct M3C2Params {
    /// Radius of the search cylinder (or ball for radius searches).
    pub cyl_radius: f64,
    /// Half-length of the search cylinder along the normal.
    pub max_distance: f64,
    /// Candidate radii for the multiscale normal estimation.
    pub normal_radii: Vec<f64>,
    /// Normals are flipped to point into the half-space of this vector.
    pub orientation: Direction,
    /// Multiplier turning the distance uncertainty into a level of detection.
    pub confidence: f64,
    pub chunk_size: usize,
    pub leaf_size: usize,
}

impl M3C2Params {
    pub fn new(cyl_radius: f64, normal_radii: Vec<f64>) -> Self {
        Self {
            cyl_radius,
            max_distance: cyl_radius,
            normal_radii,
            orientation: Direction::z(),
            confidence: DEFAULT_CONFIDENCE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            leaf_size: DEFAULT_LEAF_SIZE,
        }
    }

    /// Single-scale setup: normals estimated at the cylinder radius.
    pub fn single_scale(cyl_radius: f64) -> Self {
        Self::new(cyl_radius, vec![cyl_radius])
    }

    pub fn with_max_distance(mut self, max_distance: f64) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_orientation(mut self, orientation: Direction) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    pub fn geometry(&self) -> GeometricParams {
        GeometricParams {
            radius: self.cyl_radius,
            max_distance: self.max_distance,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.geometry().validate()?;
        if self.normal_radii.is_empty() {
            return Err(Error::invalid_parameter(
                "at least one normal radius is required",
            ));
        }
        for &r in &self.normal_radii {
            ensure_positive("normal radius", r)?;
        }
        unit_direction(&self.orientation)?;
        ensure_positive("confidence", self.confidence)?;
        if self.chunk_size == 0 {
            return Err(Error::invalid_parameter("chunk_size must be >= 1"));
        }
        if self.leaf_size == 0 {
            return Err(Error::invalid_parameter("leaf_size must be >= 1"));
        }
        Ok(())
    }
}
