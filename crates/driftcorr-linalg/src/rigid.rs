//! Rigid alignment utilities (Kabsch / orthogonal Procrustes)

use glam::{DMat3, DVec3};
use thiserror::Error;

use crate::svd::svd3;

/// Largest absolute covariance entry considered numerically zero.
const DEGENERATE_COVARIANCE_EPS: f64 = 1e-15;

/// Error type for rigid alignment operations.
#[derive(Debug, Error, PartialEq)]
pub enum RigidError {
    /// Source and destination arrays must have the same length
    #[error("Source and destination arrays must have the same length ({0} != {1})")]
    MismatchedInputLengths(usize, usize),

    /// At least one point pair is needed
    #[error("Cannot align empty point sets")]
    EmptyInput,
}

/// Arithmetic mean of a set of points.
///
/// Returns the origin for an empty slice.
pub fn centroid(points: &[DVec3]) -> DVec3 {
    if points.is_empty() {
        return DVec3::ZERO;
    }
    points.iter().fold(DVec3::ZERO, |acc, &p| acc + p) / points.len() as f64
}

/// Cross-covariance H = Σ (src - src_mean)(dst - dst_mean)ᵀ.
///
/// Rows index the source axes and columns the destination axes.
pub fn cross_covariance(
    src: &[DVec3],
    src_centroid: DVec3,
    dst: &[DVec3],
    dst_centroid: DVec3,
) -> DMat3 {
    src.iter()
        .zip(dst.iter())
        .fold(DMat3::ZERO, |h, (&s, &d)| {
            let s = s - src_centroid;
            let d = d - dst_centroid;
            h + DMat3::from_cols(s * d.x, s * d.y, s * d.z)
        })
}

/// Rotation minimizing Σ |R s - d|² for a cross-covariance H = Σ s dᵀ.
///
/// The result is always a proper rotation. With H = U Σ Vᵀ, R = V Uᵀ; when
/// that product is a reflection the column of V paired with the smallest
/// singular value is negated. A vanishing or non-finite covariance yields the
/// identity.
pub fn procrustes_rotation(covariance: &DMat3) -> DMat3 {
    let max_abs = covariance
        .to_cols_array()
        .iter()
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if !covariance.is_finite() || max_abs < DEGENERATE_COVARIANCE_EPS {
        log::trace!("degenerate covariance, falling back to identity rotation");
        return DMat3::IDENTITY;
    }

    let svd_result = svd3(covariance);
    let u = *svd_result.u();
    let v = *svd_result.v();

    let r = v * u.transpose();
    if r.determinant() < 0.0 {
        let v_corrected = DMat3::from_cols(v.x_axis, v.y_axis, -v.z_axis);
        return v_corrected * u.transpose();
    }
    r
}

/// Kabsch algorithm: rigid transform (R, t) mapping `src` onto `dst`.
///
/// Minimizes Σ |R src_i + t - dst_i|², with t = dst_mean - R src_mean.
///
/// See Arun, K., Huang, T. S., and Blostein, S. D.
/// "Least-squares fitting of two 3-D point sets." IEEE PAMI, 1987.
pub fn kabsch(src: &[DVec3], dst: &[DVec3]) -> Result<(DMat3, DVec3), RigidError> {
    if src.len() != dst.len() {
        return Err(RigidError::MismatchedInputLengths(src.len(), dst.len()));
    }
    if src.is_empty() {
        return Err(RigidError::EmptyInput);
    }

    let src_centroid = centroid(src);
    let dst_centroid = centroid(dst);

    let h = cross_covariance(src, src_centroid, dst, dst_centroid);
    let r = procrustes_rotation(&h);
    let t = dst_centroid - r * src_centroid;

    Ok((r, t))
}
