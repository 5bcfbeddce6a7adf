use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::{
    linalg,
    transforms::{self, TransformError, ROTATION_TOLERANCE},
    utils,
};

/// A rigid transform: a proper rotation followed by a translation, unit scale.
///
/// Applying the transform to a point `p` yields `R p + t`. The rotation is
/// kept orthonormal with determinant +1; constructors taking raw matrices
/// validate this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRigidTransform", into = "RawRigidTransform")]
pub struct RigidTransform {
    rotation: [[f64; 3]; 3],
    translation: [f64; 3],
}

/// Serialized form, validated on the way in.
#[derive(Serialize, Deserialize)]
struct RawRigidTransform {
    rotation: [[f64; 3]; 3],
    translation: [f64; 3],
}

impl TryFrom<RawRigidTransform> for RigidTransform {
    type Error = TransformError;

    fn try_from(raw: RawRigidTransform) -> Result<Self, Self::Error> {
        Self::from_parts(raw.rotation, raw.translation)
    }
}

impl From<RigidTransform> for RawRigidTransform {
    fn from(transform: RigidTransform) -> Self {
        Self {
            rotation: transform.rotation,
            translation: transform.translation,
        }
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Build a transform from a row-major rotation matrix and a translation.
    ///
    /// Fails with [`TransformError::NotARotation`] unless the matrix is
    /// orthonormal with determinant +1.
    pub fn from_parts(
        rotation: [[f64; 3]; 3],
        translation: [f64; 3],
    ) -> Result<Self, TransformError> {
        if !transforms::is_rotation_matrix(&rotation, ROTATION_TOLERANCE) {
            return Err(TransformError::NotARotation(rotation));
        }
        Ok(Self {
            rotation,
            translation,
        })
    }

    /// A pure translation.
    pub const fn from_translation(translation: [f64; 3]) -> Self {
        let mut transform = Self::identity();
        transform.translation = translation;
        transform
    }

    /// Rotation of `angle` radians about `axis`, followed by `translation`.
    pub fn from_axis_angle(
        axis: &[f64; 3],
        angle: f64,
        translation: [f64; 3],
    ) -> Result<Self, TransformError> {
        Ok(Self {
            rotation: transforms::axis_angle_to_rotation_matrix(axis, angle)?,
            translation,
        })
    }

    /// Build a transform from a quaternion `[x, y, z, w]` and a translation.
    pub fn from_quaternion(
        quaternion: &[f64; 4],
        translation: [f64; 3],
    ) -> Result<Self, TransformError> {
        Ok(Self {
            rotation: transforms::quaternion_to_rotation_matrix(quaternion)?,
            translation,
        })
    }

    /// Build a transform from a row-major 4x4 homogeneous matrix.
    pub fn from_homogeneous(matrix: &[[f64; 4]; 4]) -> Result<Self, TransformError> {
        if matrix[3] != [0.0, 0.0, 0.0, 1.0] {
            return Err(TransformError::InvalidHomogeneousRow(matrix[3]));
        }
        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for i in 0..3 {
            rotation[i].copy_from_slice(&matrix[i][..3]);
            translation[i] = matrix[i][3];
        }
        Self::from_parts(rotation, translation)
    }

    /// Build a transform from glam types, re-orthonormalizing the rotation.
    ///
    /// A non-finite rotation is replaced by the identity.
    pub fn from_glam(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation: utils::dmat3_to_array33(&orthonormalize(rotation)),
            translation: translation.to_array(),
        }
    }

    /// The row-major rotation matrix.
    #[inline]
    pub fn rotation(&self) -> &[[f64; 3]; 3] {
        &self.rotation
    }

    /// The translation vector.
    #[inline]
    pub fn translation(&self) -> &[f64; 3] {
        &self.translation
    }

    /// The rotation as a unit quaternion `[x, y, z, w]` with `w >= 0`.
    pub fn quaternion(&self) -> [f64; 4] {
        transforms::rotation_matrix_to_quaternion(&self.rotation)
    }

    /// The rotation as a unit axis and an angle in `[0, π]`.
    pub fn axis_angle(&self) -> ([f64; 3], f64) {
        transforms::rotation_matrix_to_axis_angle(&self.rotation)
    }

    /// The rotation angle in radians, in `[0, π]`.
    pub fn rotation_angle(&self) -> f64 {
        transforms::rotation_angle(&self.rotation)
    }

    /// The row-major 4x4 homogeneous matrix.
    pub fn to_homogeneous(&self) -> [[f64; 4]; 4] {
        let mut matrix = [[0.0; 4]; 4];
        for i in 0..3 {
            matrix[i][..3].copy_from_slice(&self.rotation[i]);
            matrix[i][3] = self.translation[i];
        }
        matrix[3][3] = 1.0;
        matrix
    }

    /// The rotation and translation as glam types.
    pub fn to_glam(&self) -> (DMat3, DVec3) {
        (
            utils::array33_to_dmat3(&self.rotation),
            utils::array3_to_dvec3(&self.translation),
        )
    }

    /// Composition `self ∘ other`: applies `other` first, then `self`.
    ///
    /// In homogeneous matrices this is `self * other`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let (r_a, t_a) = self.to_glam();
        let (r_b, t_b) = other.to_glam();
        Self::from_glam(r_a * r_b, r_a * t_b + t_a)
    }

    /// The inverse transform `(Rᵀ, -Rᵀ t)`.
    pub fn inverse(&self) -> RigidTransform {
        let (r, t) = self.to_glam();
        let r_inv = r.transpose();
        Self {
            rotation: utils::dmat3_to_array33(&r_inv),
            translation: (-(r_inv * t)).to_array(),
        }
    }

    /// Apply the transform to a single point.
    #[inline]
    pub fn transform_point(&self, point: &[f64; 3]) -> [f64; 3] {
        let (r, t) = self.to_glam();
        (r * utils::array3_to_dvec3(point) + t).to_array()
    }

    /// Apply the transform to a set of points.
    ///
    /// PRECONDITION: `dst_points` has the same length as `src_points`.
    pub fn transform_points(
        &self,
        src_points: &[[f64; 3]],
        dst_points: &mut [[f64; 3]],
    ) -> Result<(), TransformError> {
        linalg::transform_points3d(src_points, &self.rotation, &self.translation, dst_points)
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

/// Project a matrix onto the nearest proper rotation through a unit quaternion.
fn orthonormalize(rotation: DMat3) -> DMat3 {
    if !rotation.is_finite() {
        return DMat3::IDENTITY;
    }
    let q = DQuat::from_mat3(&rotation);
    let norm = q.length();
    if !norm.is_finite() || norm < 1e-10 {
        return DMat3::IDENTITY;
    }
    DMat3::from_quat(q / norm)
}
