//! Spatial Data Structures
//!
//! Implements:
//! - [`KDTree`]: static, balanced KD-tree answering radius queries
//! - [`Epoch`]: one acquisition of a scene, owning its lazily built KD-tree

pub mod epoch;
pub mod kdtree;

pub use epoch::Epoch;
pub use kdtree::KDTree;

pub use m3c2_core::{Error, Result};
