//! Static KD-tree over a point cloud.
//!
//! The tree is built once with [`KDTree::build_tree`] and never mutated by
//! queries, so a built tree can be shared across worker threads freely.

use m3c2_core::{ensure_positive, Error, Point, Result};
use rayon::prelude::*;
use std::sync::Arc;

/// KDTree for radius queries
pub struct KDTree {
    cloud: Arc<[Point]>,
    index: Option<TreeIndex>,
    precomputed: Option<Precomputed>,
}

struct TreeIndex {
    leaf_size: usize,
    /// Point indices, permuted so every leaf owns a contiguous range.
    order: Vec<usize>,
    nodes: Vec<KDNode>,
}

enum KDNode {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

struct Precomputed {
    max_radius: f64,
    /// Per query point: neighbors within `max_radius`, sorted by squared distance.
    neighbors: Vec<Vec<(usize, f64)>>,
}

impl KDTree {
    /// Wrap a cloud. The search structure is not available until
    /// [`build_tree`](Self::build_tree) is called.
    pub fn new(cloud: impl Into<Arc<[Point]>>) -> Self {
        Self {
            cloud: cloud.into(),
            index: None,
            precomputed: None,
        }
    }

    /// Wrap a cloud and build the search structure right away.
    pub fn build(cloud: impl Into<Arc<[Point]>>, leaf_size: usize) -> Result<Self> {
        let mut tree = Self::new(cloud);
        tree.build_tree(leaf_size)?;
        Ok(tree)
    }

    /// Build a balanced tree: median split along the axis of largest extent,
    /// stopping once a node holds at most `leaf_size` points.
    pub fn build_tree(&mut self, leaf_size: usize) -> Result<()> {
        if leaf_size == 0 {
            return Err(Error::invalid_parameter("leaf_size must be >= 1"));
        }

        let mut order: Vec<usize> = (0..self.cloud.len()).collect();
        let mut nodes = Vec::new();
        if !order.is_empty() {
            build_recursive(&self.cloud, &mut order, 0, leaf_size, &mut nodes);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Built KD-tree over {} points ({} nodes, leaf size {})",
            self.cloud.len(),
            nodes.len(),
            leaf_size
        );

        self.index = Some(TreeIndex {
            leaf_size,
            order,
            nodes,
        });
        self.precomputed = None;
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    pub fn leaf_size(&self) -> Option<usize> {
        self.index.as_ref().map(|index| index.leaf_size)
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

    /// Indices of all points within `radius` (inclusive) of `query`, in no
    /// particular order.
    pub fn radius_search(&self, query: &Point, radius: f64) -> Result<Vec<usize>> {
        let index = self.index()?;
        let radius = ensure_positive("search radius", radius)?;

        let mut results = Vec::new();
        if !index.nodes.is_empty() {
            index.radius_recursive(&self.cloud, 0, query, radius * radius, &mut |i, _| {
                results.push(i)
            });
        }
        Ok(results)
    }

    /// `(index, squared distance)` of all points within `radius` of `query`,
    /// sorted by increasing distance.
    pub fn radius_search_with_distances(
        &self,
        query: &Point,
        radius: f64,
    ) -> Result<Vec<(usize, f64)>> {
        let index = self.index()?;
        let radius = ensure_positive("search radius", radius)?;

        let mut results = Vec::new();
        if !index.nodes.is_empty() {
            index.radius_recursive(&self.cloud, 0, query, radius * radius, &mut |i, d| {
                results.push((i, d))
            });
        }
        results.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        Ok(results)
    }

    /// Cache the neighborhoods of `query_points` up to `max_radius`, so that
    /// later searches at any smaller radius skip the tree traversal.
    pub fn precompute(&mut self, query_points: &[Point], max_radius: f64) -> Result<()> {
        let max_radius = ensure_positive("precompute radius", max_radius)?;

        let tree = &*self;
        let neighbors = query_points
            .par_iter()
            .map(|q| tree.radius_search_with_distances(q, max_radius))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Precomputed neighborhoods of {} query points up to radius {}",
            neighbors.len(),
            max_radius
        );

        self.precomputed = Some(Precomputed {
            max_radius,
            neighbors,
        });
        Ok(())
    }

    /// Radius search around the `query_index`-th point given to
    /// [`precompute`](Self::precompute). Results are sorted by distance.
    pub fn precomputed_radius_search(&self, query_index: usize, radius: f64) -> Result<Vec<usize>> {
        let cache = self.precomputed.as_ref().ok_or_else(|| {
            Error::index_unavailable("no precomputed neighborhoods, call precompute first")
        })?;
        let radius = ensure_positive("search radius", radius)?;
        if radius > cache.max_radius {
            return Err(Error::InvalidParameter(format!(
                "radius {radius} exceeds the precomputed radius {}",
                cache.max_radius
            )));
        }
        let neighbors = cache.neighbors.get(query_index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "query index {query_index} out of range for {} precomputed points",
                cache.neighbors.len()
            ))
        })?;

        let radius_sq = radius * radius;
        let end = neighbors.partition_point(|&(_, d)| d <= radius_sq);
        Ok(neighbors[..end].iter().map(|&(i, _)| i).collect())
    }

    fn index(&self) -> Result<&TreeIndex> {
        self.index
            .as_ref()
            .ok_or_else(|| Error::index_unavailable("KD-tree queried before build_tree"))
    }
}

impl std::fmt::Debug for KDTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KDTree")
            .field("points", &self.len())
            .field("leaf_size", &self.leaf_size())
            .finish()
    }
}

impl TreeIndex {
    fn radius_recursive(
        &self,
        cloud: &[Point],
        node: usize,
        query: &Point,
        radius_sq: f64,
        visit: &mut impl FnMut(usize, f64),
    ) {
        match self.nodes[node] {
            KDNode::Leaf { start, end } => {
                for &i in &self.order[start..end] {
                    let dist = (cloud[i] - query).norm_squared();
                    if dist <= radius_sq {
                        visit(i, dist);
                    }
                }
            }
            KDNode::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = query[axis] - value;
                let (first, second) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };

                self.radius_recursive(cloud, first, query, radius_sq, visit);

                // Check if we need to explore the other side
                if diff * diff <= radius_sq {
                    self.radius_recursive(cloud, second, query, radius_sq, visit);
                }
            }
        }
    }
}

fn build_recursive(
    cloud: &[Point],
    order: &mut [usize],
    offset: usize,
    leaf_size: usize,
    nodes: &mut Vec<KDNode>,
) -> usize {
    let id = nodes.len();
    if order.len() <= leaf_size {
        nodes.push(KDNode::Leaf {
            start: offset,
            end: offset + order.len(),
        });
        return id;
    }

    let axis = widest_axis(cloud, order);
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| cloud[a][axis].total_cmp(&cloud[b][axis]));
    let value = cloud[order[mid]][axis];

    // Placeholder until both children have ids.
    nodes.push(KDNode::Leaf { start: 0, end: 0 });
    let (lower, upper) = order.split_at_mut(mid);
    let left = build_recursive(cloud, lower, offset, leaf_size, nodes);
    let right = build_recursive(cloud, upper, offset + mid, leaf_size, nodes);
    nodes[id] = KDNode::Split {
        axis,
        value,
        left,
        right,
    };
    id
}

fn widest_axis(cloud: &[Point], order: &[usize]) -> usize {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for &i in order {
        for axis in 0..3 {
            min[axis] = min[axis].min(cloud[i][axis]);
            max[axis] = max[axis].max(cloud[i][axis]);
        }
    }
    (0..3)
        .max_by(|&a, &b| (max[a] - min[a]).total_cmp(&(max[b] - min[b])))
        .unwrap_or(0)
}
