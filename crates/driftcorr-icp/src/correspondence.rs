use driftcorr_3d::RigidTransform;
use glam::DVec3;
use rayon::prelude::*;

use crate::config::OutlierRejection;
use crate::error::{ensure_all_finite, ensure_non_empty, ensure_same_len, IcpError};
use crate::point_index::PointIndex;

/// Scale factor turning a median absolute deviation into a standard deviation estimate.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Pairing of a transformed query point with its nearest reference point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Correspondence {
    /// The query point after applying the current transform.
    pub subject: [f64; 3],
    /// The nearest reference point.
    pub target: [f64; 3],
    /// Index of `target` in the reference set.
    pub target_index: usize,
    /// Squared distance between `subject` and `target`.
    pub distance_squared: f64,
}

/// Match every query point, moved by `transform`, with its nearest reference point.
///
/// The i-th correspondence always belongs to the i-th query point.
pub fn find_correspondences(
    query: &[[f64; 3]],
    transform: &RigidTransform,
    index: &PointIndex,
) -> Result<Vec<Correspondence>, IcpError> {
    let mut results = vec![Correspondence::default(); query.len()];
    find_correspondences_into(query, transform, index, &mut results)?;
    Ok(results)
}

/// Same as [`find_correspondences`] writing into a caller-provided buffer.
///
/// PRECONDITION: `results` has the same length as `query`.
///
/// A query point with a NaN or infinite coordinate fails with
/// [`IcpError::NonFinitePoint`] and leaves `results` untouched.
pub fn find_correspondences_into(
    query: &[[f64; 3]],
    transform: &RigidTransform,
    index: &PointIndex,
    results: &mut [Correspondence],
) -> Result<(), IcpError> {
    ensure_non_empty(query, "query")?;
    ensure_same_len(query, "query", results, "results")?;
    ensure_all_finite(query)?;

    let (rotation, translation) = transform.to_glam();

    results
        .par_iter_mut()
        .zip(query.par_iter())
        .for_each(|(correspondence, point)| {
            let subject = (rotation * DVec3::from_array(*point) + translation).to_array();
            let nn = index.nearest(&subject);
            *correspondence = Correspondence {
                subject,
                target: nn.point,
                target_index: nn.index,
                distance_squared: nn.distance_squared,
            };
        });

    Ok(())
}

/// Drop the correspondences the rejection policy classifies as outliers.
///
/// The relative order of the kept correspondences is preserved.
pub fn reject_outliers(correspondences: &mut Vec<Correspondence>, rejection: &OutlierRejection) {
    match *rejection {
        OutlierRejection::None => {}
        OutlierRejection::MaxDistance(max_distance) => {
            let max_squared = max_distance * max_distance;
            correspondences.retain(|c| c.distance_squared <= max_squared);
        }
        OutlierRejection::MedianAbsoluteDeviation(k) => {
            if correspondences.is_empty() {
                return;
            }
            let mut distances = correspondences
                .iter()
                .map(|c| c.distance_squared.sqrt())
                .collect::<Vec<_>>();
            let median_dist = median(&mut distances);

            let mut deviations = distances
                .iter()
                .map(|d| (d - median_dist).abs())
                .collect::<Vec<_>>();
            let mad = median(&mut deviations);

            let threshold = median_dist + k * MAD_TO_SIGMA * mad;
            correspondences.retain(|c| c.distance_squared.sqrt() <= threshold);
        }
    }
}

/// Root mean square of the correspondence distances, zero when empty.
pub fn rmse(correspondences: &[Correspondence]) -> f64 {
    if correspondences.is_empty() {
        return 0.0;
    }
    let sum = correspondences
        .iter()
        .map(|c| c.distance_squared)
        .sum::<f64>();
    (sum / correspondences.len() as f64).sqrt()
}

/// Mean of the correspondence distances, zero when empty.
pub fn mean_residual(correspondences: &[Correspondence]) -> f64 {
    if correspondences.is_empty() {
        return 0.0;
    }
    let sum = correspondences
        .iter()
        .map(|c| c.distance_squared.sqrt())
        .sum::<f64>();
    sum / correspondences.len() as f64
}

// upper median, reorders `values`
fn median(values: &mut [f64]) -> f64 {
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    *median
}
