use crate::KDTree;
use m3c2_core::{Error, Point, Result, DEFAULT_LEAF_SIZE};
use std::sync::{Arc, OnceLock};

/// One acquisition of the observed scene.
///
/// The point data is immutable. The KD-tree is derived from it on demand and
/// cached for the lifetime of the epoch.
#[derive(Debug, Clone)]
pub struct Epoch {
    cloud: Arc<[Point]>,
    registration_error: f64,
    kdtree: OnceLock<Arc<KDTree>>,
}

impl Epoch {
    pub fn new(points: impl Into<Arc<[Point]>>) -> Self {
        Self {
            cloud: points.into(),
            registration_error: 0.0,
            kdtree: OnceLock::new(),
        }
    }

    pub fn from_xyz(coords: &[[f64; 3]]) -> Self {
        Self::new(
            coords
                .iter()
                .map(|&[x, y, z]| Point::new(x, y, z))
                .collect::<Vec<_>>(),
        )
    }

    /// Attach the registration error of this epoch.
    pub fn with_registration_error(mut self, registration_error: f64) -> Result<Self> {
        if !registration_error.is_finite() || registration_error < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "registration error must be finite and non-negative, got {registration_error}"
            )));
        }
        self.registration_error = registration_error;
        Ok(self)
    }

    pub fn cloud(&self) -> &[Point] {
        &self.cloud
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }

    pub fn registration_error(&self) -> f64 {
        self.registration_error
    }

    /// Eagerly build the search index with a chosen leaf size. An index that
    /// already exists is kept as is.
    pub fn build_kdtree(&self, leaf_size: usize) -> Result<&KDTree> {
        if let Some(tree) = self.kdtree.get() {
            return Ok(tree.as_ref());
        }
        let tree = Arc::new(KDTree::build(self.cloud.clone(), leaf_size)?);
        Ok(self.kdtree.get_or_init(|| tree).as_ref())
    }

    /// The search index, built with the default leaf size on first use.
    pub fn kdtree(&self) -> Result<&KDTree> {
        self.build_kdtree(DEFAULT_LEAF_SIZE)
    }

    /// A private tree over this epoch with the neighborhoods of
    /// `query_points` up to `max_radius` cached, so searches at several
    /// smaller radii around the same points traverse the tree only once.
    /// Uses the leaf size of the shared index.
    pub fn neighborhoods(&self, query_points: &[Point], max_radius: f64) -> Result<KDTree> {
        let leaf_size = self.kdtree()?.leaf_size().unwrap_or(DEFAULT_LEAF_SIZE);
        let mut tree = KDTree::build(self.cloud.clone(), leaf_size)?;
        tree.precompute(query_points, max_radius)?;
        Ok(tree)
    }

    pub fn has_kdtree(&self) -> bool {
        self.kdtree.get().is_some()
    }
}

impl From<Vec<Point>> for Epoch {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}
