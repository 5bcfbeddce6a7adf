use driftcorr_3d::RigidTransform;
use glam::DVec3;

use crate::correspondence::{find_correspondences, Correspondence};
use crate::error::IcpError;
use crate::fit::fit_delta;
use crate::point_index::PointIndex;

/// One ICP step using point to point distance.
///
/// Every query point is moved by `current` and paired with its nearest
/// reference point in `index`. The least-squares rigid transform `Δ` between
/// the moved points and their matches is fitted and `Δ ∘ current` returned.
/// Inputs are left untouched; the caller decides how often to iterate.
///
/// # Arguments
///
/// * `query` - Live points, in their own frame.
/// * `current` - Current estimate of the transform from the query frame to the reference frame.
/// * `index` - Spatial index over the reference points.
///
/// # Errors
///
/// [`IcpError::EmptyPointSet`] if `query` is empty and
/// [`IcpError::NonFinitePoint`] if a query point has a NaN or infinite coordinate.
///
/// Example:
///
/// ```
/// use driftcorr_3d::RigidTransform;
/// use driftcorr_icp::{iterate, PointIndex};
///
/// let reference = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
/// let index = PointIndex::build(&reference).unwrap();
///
/// let query = vec![[0.1, 0.0, 0.0], [1.1, 0.0, 0.0], [0.1, 1.0, 0.0], [0.1, 0.0, 1.0]];
/// let transform = iterate(&query, &RigidTransform::identity(), &index).unwrap();
/// assert!((transform.translation()[0] + 0.1).abs() < 1e-9);
/// ```
pub fn iterate(
    query: &[[f64; 3]],
    current: &RigidTransform,
    index: &PointIndex,
) -> Result<RigidTransform, IcpError> {
    let correspondences = find_correspondences(query, current, index)?;
    let (subject, target) = correspondence_pairs(&correspondences);
    let delta = fit_delta(&subject, &target)?;
    Ok(delta.compose(current))
}

/// Split correspondences into matching subject and target point lists.
pub(crate) fn correspondence_pairs(correspondences: &[Correspondence]) -> (Vec<DVec3>, Vec<DVec3>) {
    correspondences
        .iter()
        .map(|c| (DVec3::from_array(c.subject), DVec3::from_array(c.target)))
        .unzip()
}
