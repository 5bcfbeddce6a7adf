use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::JoinHandle;

use driftcorr_3d::pointcloud::PointCloud;

use crate::error::{ensure_all_finite, ensure_non_empty, IcpError};

/// Ranges with at most this many points are scanned linearly.
pub const LEAF_SIZE: usize = 16;

/// Result of a query against a [`PointIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// The indexed point.
    pub point: [f64; 3],
    /// Position of the point in the sequence the index was built from.
    pub index: usize,
    /// Squared Euclidean distance to the query.
    pub distance_squared: f64,
}

impl Neighbor {
    /// Euclidean distance to the query.
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance_squared.sqrt()
    }
}

/// Immutable k-d tree over a fixed, non-empty set of 3d points.
///
/// The tree is stored implicitly: the points are reordered so that every
/// range `[lo, hi)` has its splitting point at `lo + (hi - lo) / 2`, with the
/// lower half on the left and the upper half on the right. The split axis of
/// each node is kept in a flat array aligned with the reordered points.
///
/// Queries take `&self` and the index is `Send + Sync`, so it can be shared
/// between threads without locking.
#[derive(Debug, Clone)]
pub struct PointIndex {
    // points in build order
    points: Vec<[f64; 3]>,
    // points in tree order
    tree: Vec<[f64; 3]>,
    // build-order index of each tree slot
    indices: Vec<usize>,
    // split axis of the node whose splitting point sits at this slot
    split_dims: Vec<u8>,
}

impl PointIndex {
    /// Build an index over a copy of `points`.
    ///
    /// # Errors
    ///
    /// [`IcpError::EmptyPointSet`] for an empty slice and
    /// [`IcpError::NonFinitePoint`] if any coordinate is NaN or infinite.
    pub fn build(points: &[[f64; 3]]) -> Result<Self, IcpError> {
        Self::from_vec(points.to_vec())
    }

    /// Build an index taking ownership of `points`.
    pub fn from_vec(points: Vec<[f64; 3]>) -> Result<Self, IcpError> {
        ensure_non_empty(&points, "reference")?;
        ensure_all_finite(&points)?;

        let now = std::time::Instant::now();

        let mut indices = (0..points.len()).collect::<Vec<_>>();
        let mut split_dims = vec![0u8; points.len()];
        build_range(&points, &mut indices, &mut split_dims, 0);
        let tree = indices.iter().map(|&i| points[i]).collect();

        log::debug!(
            "Built point index over {} points in {:?}",
            points.len(),
            now.elapsed()
        );

        Ok(Self {
            points,
            tree,
            indices,
            split_dims,
        })
    }

    /// Build an index taking ownership of the points of `cloud`.
    pub fn from_cloud(cloud: PointCloud) -> Result<Self, IcpError> {
        Self::from_vec(cloud.into_points())
    }

    /// Build the index on a dedicated worker thread.
    ///
    /// The returned handle can be polled with [`PendingIndex::is_ready`] and
    /// must be resolved with [`PendingIndex::wait`] before querying.
    pub fn build_in_background(points: Vec<[f64; 3]>) -> Result<PendingIndex, IcpError> {
        let handle = std::thread::Builder::new()
            .name("point-index-build".to_string())
            .spawn(move || PointIndex::from_vec(points))?;
        Ok(PendingIndex { handle })
    }

    /// Number of indexed points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`: an index cannot be built from an empty set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The indexed points in build order.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// The indexed point closest to `query`.
    ///
    /// Among several points at the same distance any one may be returned.
    pub fn nearest(&self, query: &[f64; 3]) -> Neighbor {
        let mut best = (0, squared_distance(&self.tree[0], query));
        self.nearest_in(0, self.tree.len(), query, &mut best);
        self.neighbor(best.0, best.1)
    }

    /// Up to `k` indexed points closest to `query`, sorted by increasing distance.
    pub fn nearest_k(&self, query: &[f64; 3], k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.nearest_k_in(0, self.tree.len(), query, k, &mut heap);
        heap.into_sorted_vec()
            .into_iter()
            .map(|c| self.neighbor(c.slot, c.distance_squared))
            .collect()
    }

    /// All indexed points within `radius` of `query`, sorted by increasing distance.
    ///
    /// The bound is inclusive. A negative or NaN radius matches nothing.
    pub fn within_radius(&self, query: &[f64; 3], radius: f64) -> Vec<Neighbor> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let mut found = Vec::new();
        self.within_radius_in(0, self.tree.len(), query, radius * radius, &mut found);
        found.sort_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared));
        found
            .into_iter()
            .map(|c| self.neighbor(c.slot, c.distance_squared))
            .collect()
    }

    fn neighbor(&self, slot: usize, distance_squared: f64) -> Neighbor {
        Neighbor {
            point: self.tree[slot],
            index: self.indices[slot],
            distance_squared,
        }
    }

    fn nearest_in(&self, lo: usize, hi: usize, query: &[f64; 3], best: &mut (usize, f64)) {
        if hi - lo <= LEAF_SIZE {
            for slot in lo..hi {
                let d = squared_distance(&self.tree[slot], query);
                if d < best.1 {
                    *best = (slot, d);
                }
            }
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let d = squared_distance(&self.tree[mid], query);
        if d < best.1 {
            *best = (mid, d);
        }

        let dim = self.split_dims[mid] as usize;
        let diff = query[dim] - self.tree[mid][dim];
        let ((near_lo, near_hi), (far_lo, far_hi)) = split_children(lo, mid, hi, diff);

        self.nearest_in(near_lo, near_hi, query, best);
        if diff * diff < best.1 {
            self.nearest_in(far_lo, far_hi, query, best);
        }
    }

    fn nearest_k_in(
        &self,
        lo: usize,
        hi: usize,
        query: &[f64; 3],
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        let mut offer = |slot: usize| {
            let candidate = Candidate {
                slot,
                distance_squared: squared_distance(&self.tree[slot], query),
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap
                .peek()
                .is_some_and(|worst| candidate.distance_squared < worst.distance_squared)
            {
                heap.pop();
                heap.push(candidate);
            }
        };

        if hi - lo <= LEAF_SIZE {
            (lo..hi).for_each(offer);
            return;
        }

        let mid = lo + (hi - lo) / 2;
        offer(mid);

        let dim = self.split_dims[mid] as usize;
        let diff = query[dim] - self.tree[mid][dim];
        let ((near_lo, near_hi), (far_lo, far_hi)) = split_children(lo, mid, hi, diff);

        self.nearest_k_in(near_lo, near_hi, query, k, heap);
        let worst = match heap.peek() {
            Some(c) if heap.len() == k => c.distance_squared,
            _ => f64::INFINITY,
        };
        if diff * diff < worst {
            self.nearest_k_in(far_lo, far_hi, query, k, heap);
        }
    }

    fn within_radius_in(
        &self,
        lo: usize,
        hi: usize,
        query: &[f64; 3],
        radius_squared: f64,
        found: &mut Vec<Candidate>,
    ) {
        let mut check = |slot: usize| {
            let distance_squared = squared_distance(&self.tree[slot], query);
            if distance_squared <= radius_squared {
                found.push(Candidate {
                    slot,
                    distance_squared,
                });
            }
        };

        if hi - lo <= LEAF_SIZE {
            (lo..hi).for_each(check);
            return;
        }

        let mid = lo + (hi - lo) / 2;
        check(mid);

        let dim = self.split_dims[mid] as usize;
        let diff = query[dim] - self.tree[mid][dim];
        let ((near_lo, near_hi), (far_lo, far_hi)) = split_children(lo, mid, hi, diff);

        self.within_radius_in(near_lo, near_hi, query, radius_squared, found);
        if diff * diff <= radius_squared {
            self.within_radius_in(far_lo, far_hi, query, radius_squared, found);
        }
    }
}

/// Handle to an index being built on a worker thread.
#[derive(Debug)]
pub struct PendingIndex {
    handle: JoinHandle<Result<PointIndex, IcpError>>,
}

impl PendingIndex {
    /// Whether the build has finished, without blocking.
    pub fn is_ready(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the build finishes and return its result.
    pub fn wait(self) -> Result<PointIndex, IcpError> {
        self.handle
            .join()
            .map_err(|_| IcpError::IndexBuildPanicked)?
    }
}

/// Max-heap entry ordered by distance.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    slot: usize,
    distance_squared: f64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then(self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Children of a node as (near, far) ranges for a query on side `diff`.
#[inline]
fn split_children(
    lo: usize,
    mid: usize,
    hi: usize,
    diff: f64,
) -> ((usize, usize), (usize, usize)) {
    if diff < 0.0 {
        ((lo, mid), (mid + 1, hi))
    } else {
        ((mid + 1, hi), (lo, mid))
    }
}

/// Reorder `order[..]` (offset `base` in the full tree) into an implicit k-d tree.
fn build_range(points: &[[f64; 3]], order: &mut [usize], split_dims: &mut [u8], base: usize) {
    if order.len() <= LEAF_SIZE {
        return;
    }

    // split on the axis of greatest spread
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for &i in order.iter() {
        for d in 0..3 {
            min[d] = min[d].min(points[i][d]);
            max[d] = max[d].max(points[i][d]);
        }
    }
    let dim = (0..3)
        .max_by(|&a, &b| (max[a] - min[a]).total_cmp(&(max[b] - min[b])))
        .unwrap_or(0);

    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| points[a][dim].total_cmp(&points[b][dim]));
    split_dims[base + mid] = dim as u8;

    let (left, rest) = order.split_at_mut(mid);
    build_range(points, left, split_dims, base);
    build_range(points, &mut rest[1..], split_dims, base + mid + 1);
}
