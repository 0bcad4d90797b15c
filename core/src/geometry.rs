use crate::{ensure_positive, Error, Result};
use nalgebra::{Point3, Vector3};

pub type Point = Point3<f64>;
pub type Direction = Vector3<f64>;

/// Directions shorter than this are treated as degenerate.
pub const MIN_DIRECTION_NORM: f64 = 1e-12;

/// Normalize a direction, rejecting zero-length or non-finite vectors.
pub fn unit_direction(direction: &Direction) -> Result<Direction> {
    let norm = direction.norm();
    if !norm.is_finite() || norm < MIN_DIRECTION_NORM {
        return Err(Error::InvalidDirection(format!(
            "direction [{}, {}, {}] has no usable length",
            direction.x, direction.y, direction.z
        )));
    }
    Ok(direction / norm)
}

/// Search geometry shared by every working-set query in a run.
///
/// `radius` is the ball radius for radius searches and the cylinder radius for
/// cylinder searches; `max_distance` is the cylinder half-length along the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricParams {
    pub radius: f64,
    pub max_distance: f64,
}

impl GeometricParams {
    pub fn new(radius: f64, max_distance: f64) -> Result<Self> {
        Ok(Self {
            radius: ensure_positive("radius", radius)?,
            max_distance: ensure_positive("max_distance", max_distance)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("radius", self.radius)?;
        ensure_positive("max_distance", self.max_distance)?;
        Ok(())
    }

    /// Radius of the smallest ball around the core point enclosing the cylinder.
    pub fn enclosing_radius(&self) -> f64 {
        self.radius.hypot(self.max_distance)
    }
}

/// Registration error of each epoch, entering the distance uncertainty.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegistrationError {
    pub epoch1: f64,
    pub epoch2: f64,
}

impl RegistrationError {
    pub fn new(epoch1: f64, epoch2: f64) -> Self {
        Self { epoch1, epoch2 }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("epoch 1", self.epoch1), ("epoch 2", self.epoch2)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "registration error of {name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Both epochs' errors combined in quadrature.
    pub fn combined(&self) -> f64 {
        self.epoch1.hypot(self.epoch2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_direction() {
        let d = unit_direction(&Vector3::new(0.0, 3.0, 4.0)).unwrap();
        assert!((d.norm() - 1.0).abs() < 1e-12);
        assert!((d.y - 0.6).abs() < 1e-12);

        assert!(matches!(
            unit_direction(&Vector3::zeros()),
            Err(Error::InvalidDirection(_))
        ));
        assert!(unit_direction(&Vector3::new(f64::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_geometric_params() {
        let geom = GeometricParams::new(3.0, 4.0).unwrap();
        assert!((geom.enclosing_radius() - 5.0).abs() < 1e-12);
        assert!(GeometricParams::new(0.0, 1.0).is_err());
        assert!(GeometricParams::new(1.0, -2.0).is_err());

        let bad = GeometricParams {
            radius: 1.0,
            max_distance: 0.0,
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_registration_error() {
        let reg = RegistrationError::new(0.3, 0.4);
        assert!(reg.validate().is_ok());
        assert!((reg.combined() - 0.5).abs() < 1e-12);

        let reg = RegistrationError::new(-0.1, 0.0);
        assert!(matches!(reg.validate(), Err(Error::InvalidInput(_))));
    }
}
