//! Core types shared by the M3C2 workspace crates.
//!
//! - [`Error`] / [`Result`]: the error taxonomy every crate reports through
//! - [`geometry`]: point/direction aliases and the per-run search geometry
//! - [`params`]: run configuration ([`M3C2Params`])
//! - [`runtime`]: global Rayon thread pool setup

pub mod geometry;
pub mod params;
pub mod runtime;

pub use geometry::*;
pub use params::*;
pub use runtime::*;

use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

/// Error raised by user-supplied strategies, kept as-is across worker threads.
pub type CallbackError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Callback(CallbackError),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn invalid_direction(msg: impl Into<String>) -> Self {
        Self::InvalidDirection(msg.into())
    }

    pub fn index_unavailable(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap an arbitrary error raised inside a custom working-set finder or
    /// uncertainty calculator.
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(err))
    }

    /// Recover the concrete error a callback raised, if this is one.
    pub fn downcast_callback<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Callback(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Check that `value` is finite and strictly positive.
pub fn ensure_positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidParameter(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("division by zero in {0}")]
    struct DivisionByZero(&'static str);

    #[test]
    fn test_callback_error_roundtrip() {
        let err = Error::callback(DivisionByZero("finder"));
        assert_eq!(err.to_string(), "division by zero in finder");
        assert_eq!(
            err.downcast_callback::<DivisionByZero>(),
            Some(&DivisionByZero("finder"))
        );
        assert!(err.downcast_callback::<std::fmt::Error>().is_none());
    }

    #[test]
    fn test_ensure_positive() {
        assert_eq!(ensure_positive("radius", 2.5).unwrap(), 2.5);
        assert!(matches!(
            ensure_positive("radius", 0.0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(ensure_positive("radius", -1.0).is_err());
        assert!(ensure_positive("radius", f64::NAN).is_err());
        assert!(ensure_positive("radius", f64::INFINITY).is_err());
    }
}
