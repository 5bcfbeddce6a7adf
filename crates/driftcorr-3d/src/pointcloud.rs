use glam::DVec3;

use crate::{linalg, rigid::RigidTransform, transforms::TransformError};

/// A point cloud as an ordered set of 3d points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    /// Create a new point cloud from points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Consume the point cloud and return its points.
    pub fn into_points(self) -> Vec<[f64; 3]> {
        self.points
    }

    /// Get the minimum bound of the point cloud, `None` if empty.
    pub fn min_bound(&self) -> Option<[f64; 3]> {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(|a, b| a.min(b))
            .map(|v| v.to_array())
    }

    /// Get the maximum bound of the point cloud, `None` if empty.
    pub fn max_bound(&self) -> Option<[f64; 3]> {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(|a, b| a.max(b))
            .map(|v| v.to_array())
    }

    /// Get the centroid of the point cloud, `None` if empty.
    pub fn centroid(&self) -> Option<[f64; 3]> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + DVec3::from_array(*p));
        Some((sum / self.points.len() as f64).to_array())
    }

    /// Return a new point cloud with every point transformed.
    pub fn transformed(&self, transform: &RigidTransform) -> Result<Self, TransformError> {
        let mut points = vec![[0.0; 3]; self.points.len()];
        linalg::transform_points3d(
            &self.points,
            transform.rotation(),
            transform.translation(),
            &mut points,
        )?;
        Ok(Self { points })
    }
}

impl From<Vec<[f64; 3]>> for PointCloud {
    fn from(points: Vec<[f64; 3]>) -> Self {
        Self::new(points)
    }
}
