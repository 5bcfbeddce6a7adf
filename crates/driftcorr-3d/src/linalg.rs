use crate::transforms::TransformError;
use crate::utils;

/// Transform a set of points using a rotation and translation.
///
/// # Arguments
///
/// * `src_points` - A set of points to be transformed.
/// * `dst_r_src` - A row-major rotation matrix.
/// * `dst_t_src` - A translation vector.
/// * `dst_points` - A pre-allocated slice to store the transformed points.
///
/// PRECONDITION: dst_points has the same length as src_points.
///
/// Example:
///
/// ```
/// use driftcorr_3d::linalg::transform_points3d;
///
/// let src_points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let translation = [0.0, 0.0, 0.0];
/// let mut dst_points = vec![[0.0; 3]; src_points.len()];
/// transform_points3d(&src_points, &rotation, &translation, &mut dst_points).unwrap();
/// assert_eq!(dst_points, src_points);
/// ```
pub fn transform_points3d(
    src_points: &[[f64; 3]],
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
    dst_points: &mut [[f64; 3]],
) -> Result<(), TransformError> {
    if src_points.len() != dst_points.len() {
        return Err(TransformError::MismatchedPointCount(
            src_points.len(),
            dst_points.len(),
        ));
    }

    let rotation = utils::array33_to_dmat3(dst_r_src);
    let translation = utils::array3_to_dvec3(dst_t_src);

    for (point_dst, point_src) in dst_points.iter_mut().zip(src_points.iter()) {
        *point_dst = (rotation * utils::array3_to_dvec3(point_src) + translation).to_array();
    }

    Ok(())
}
