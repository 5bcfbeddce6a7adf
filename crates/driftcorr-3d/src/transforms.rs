use glam::DQuat;

use crate::utils;

/// Error types for the 3d transforms.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    /// A rotation axis of (near) zero length.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,

    /// A quaternion of (near) zero norm or with non-finite components.
    #[error("cannot compute rotation matrix from quaternion {0:?}")]
    InvalidQuaternion([f64; 4]),

    /// The matrix is not a proper rotation (orthonormal with determinant +1).
    #[error("matrix is not a proper rotation: {0:?}")]
    NotARotation([[f64; 3]; 3]),

    /// The bottom row of a homogeneous rigid transform must be [0, 0, 0, 1].
    #[error("homogeneous transform has an invalid bottom row: {0:?}")]
    InvalidHomogeneousRow([f64; 4]),

    /// Source and destination point buffers differ in length.
    #[error("source has {0} points but destination has {1}")]
    MismatchedPointCount(usize, usize),
}

/// Tolerance used to accept a matrix as a proper rotation.
pub const ROTATION_TOLERANCE: f64 = 1e-6;

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It is normalized internally.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The row-major rotation matrix.
///
/// Example:
///
/// ```
/// use driftcorr_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[1][2] + 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], TransformError> {
    // normalize the vector
    let axis_norm = {
        let magnitude = (axis[0].powi(2) + axis[1].powi(2) + axis[2].powi(2)).sqrt();
        match magnitude < 1e-10 || !magnitude.is_finite() {
            true => return Err(TransformError::ZeroAxis),
            false => [
                axis[0] / magnitude,
                axis[1] / magnitude,
                axis[2] / magnitude,
            ],
        }
    };

    let x = axis_norm[0];
    let y = axis_norm[1];
    let z = axis_norm[2];

    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    let m00 = c + x * x * t;
    let m11 = c + y * y * t;
    let m22 = c + z * z * t;

    let tmp1 = x * y * t;
    let tmp2 = z * s;

    let m10 = tmp1 + tmp2;
    let m01 = tmp1 - tmp2;

    let tmp3 = x * z * t;
    let tmp4 = y * s;

    let m20 = tmp3 - tmp4;
    let m02 = tmp3 + tmp4;

    let tmp5 = y * z * t;
    let tmp6 = x * s;

    let m12 = tmp5 - tmp6;
    let m21 = tmp5 + tmp6;

    Ok([[m00, m01, m02], [m10, m11, m12], [m20, m21, m22]])
}

/// Convert a rotation matrix to its axis-angle representation.
///
/// The angle is in `[0, π]`. For the identity the axis is +X.
pub fn rotation_matrix_to_axis_angle(rotation: &[[f64; 3]; 3]) -> ([f64; 3], f64) {
    let mut q = DQuat::from_mat3(&utils::array33_to_dmat3(rotation)).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    let (axis, angle) = q.to_axis_angle();
    (axis.to_array(), angle)
}

/// Rotation angle in radians, in `[0, π]`, of a rotation matrix.
///
/// Computed from the trace so it is well defined even for the identity.
pub fn rotation_angle(rotation: &[[f64; 3]; 3]) -> f64 {
    let trace = rotation[0][0] + rotation[1][1] + rotation[2][2];
    ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
}

/// Convert a quaternion `[x, y, z, w]` to a row-major rotation matrix.
///
/// The quaternion is normalized first.
pub fn quaternion_to_rotation_matrix(q: &[f64; 4]) -> Result<[[f64; 3]; 3], TransformError> {
    let quat = DQuat::from_array(*q);
    let norm = quat.length();
    if !norm.is_finite() || norm < 1e-10 {
        return Err(TransformError::InvalidQuaternion(*q));
    }
    Ok(utils::dmat3_to_array33(&glam::DMat3::from_quat(
        quat / norm,
    )))
}

/// Convert a proper rotation matrix to a unit quaternion `[x, y, z, w]` with `w >= 0`.
pub fn rotation_matrix_to_quaternion(rotation: &[[f64; 3]; 3]) -> [f64; 4] {
    let mut q = DQuat::from_mat3(&utils::array33_to_dmat3(rotation)).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    q.to_array()
}

/// Check that a matrix is orthonormal with determinant +1 within `tolerance`.
pub fn is_rotation_matrix(rotation: &[[f64; 3]; 3], tolerance: f64) -> bool {
    let m = utils::array33_to_dmat3(rotation);
    m.is_finite()
        && (m.determinant() - 1.0).abs() <= tolerance
        && (m.transpose() * m).abs_diff_eq(glam::DMat3::IDENTITY, tolerance)
}
