use driftcorr_3d::RigidTransform;
use driftcorr_linalg::rigid;
use glam::DVec3;

use crate::error::{ensure_all_finite, ensure_non_empty, ensure_same_len, IcpError};

/// Compute the centroids of two sets of points.
///
/// # Arguments
///
/// * `points1` - A set of points.
/// * `points2` - Another set of points.
///
/// # Returns
///
/// The centroids of the two sets of points, each computed from its own set.
/// An empty set has its centroid at the origin.
pub fn compute_centroids(points1: &[[f64; 3]], points2: &[[f64; 3]]) -> (DVec3, DVec3) {
    (
        rigid::centroid(&to_dvec3(points1)),
        rigid::centroid(&to_dvec3(points2)),
    )
}

/// Best-fit rigid transform between two corresponding point sets.
///
/// Both sets are first moved into a common frame by their transforms. With
/// `Δ` the least-squares rigid transform mapping the moved subject onto the
/// moved target, the result is `Δ ∘ subject_transform`, i.e. the refined
/// subject transform.
///
/// # Arguments
///
/// * `subject` - Points to be aligned.
/// * `subject_transform` - Current transform of the subject points.
/// * `target` - Points `subject[i]` should land on, same length as `subject`.
/// * `target_transform` - Transform of the target points.
///
/// # Errors
///
/// [`IcpError::MismatchedArrayLengths`] if the lengths differ,
/// [`IcpError::EmptyPointSet`] for empty input and
/// [`IcpError::NonFinitePoint`] for a NaN or infinite coordinate.
pub fn fit_corresponding_points(
    subject: &[[f64; 3]],
    subject_transform: &RigidTransform,
    target: &[[f64; 3]],
    target_transform: &RigidTransform,
) -> Result<RigidTransform, IcpError> {
    ensure_same_len(subject, "subject", target, "target")?;
    ensure_non_empty(subject, "subject")?;
    ensure_all_finite(subject)?;
    ensure_all_finite(target)?;

    let subject_moved = transform_to_dvec3(subject, subject_transform);
    let target_moved = transform_to_dvec3(target, target_transform);

    let delta = fit_delta(&subject_moved, &target_moved)?;
    Ok(delta.compose(subject_transform))
}

/// Rigid transform mapping `points_in_src` onto `points_in_dst`.
///
/// Equivalent to [`fit_corresponding_points`] with identity transforms.
pub fn fit_transformation(
    points_in_src: &[[f64; 3]],
    points_in_dst: &[[f64; 3]],
) -> Result<RigidTransform, IcpError> {
    ensure_same_len(points_in_src, "source", points_in_dst, "destination")?;
    ensure_non_empty(points_in_src, "source")?;
    ensure_all_finite(points_in_src)?;
    ensure_all_finite(points_in_dst)?;
    fit_delta(&to_dvec3(points_in_src), &to_dvec3(points_in_dst))
}

/// Least-squares rigid transform between already aligned point pairs.
pub(crate) fn fit_delta(subject: &[DVec3], target: &[DVec3]) -> Result<RigidTransform, IcpError> {
    let (rotation, translation) = rigid::kabsch(subject, target)?;
    Ok(RigidTransform::from_glam(rotation, translation))
}

fn to_dvec3(points: &[[f64; 3]]) -> Vec<DVec3> {
    points.iter().map(|p| DVec3::from_array(*p)).collect()
}

fn transform_to_dvec3(points: &[[f64; 3]], transform: &RigidTransform) -> Vec<DVec3> {
    let (rotation, translation) = transform.to_glam();
    points
        .iter()
        .map(|p| rotation * DVec3::from_array(*p) + translation)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use driftcorr_3d::transforms::{axis_angle_to_rotation_matrix, is_rotation_matrix};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn create_random_points(rng: &mut StdRng, num_points: usize) -> Vec<[f64; 3]> {
        (0..num_points)
            .map(|_| [rng.random(), rng.random(), rng.random()])
            .collect()
    }

    fn create_random_transform(
        rng: &mut StdRng,
        rotation_factor: f64,
        translation_factor: f64,
    ) -> Result<RigidTransform, Box<dyn std::error::Error>> {
        let axis = [
            rng.random::<f64>() + 0.1,
            rng.random::<f64>(),
            rng.random::<f64>(),
        ];
        let angle = rng.random::<f64>() * rotation_factor;
        let translation = [
            rng.random::<f64>() * translation_factor,
            rng.random::<f64>() * translation_factor,
            rng.random::<f64>() * translation_factor,
        ];
        Ok(RigidTransform::from_axis_angle(&axis, angle, translation)?)
    }

    fn assert_points_eq(a: &[[f64; 3]], b: &[[f64; 3]], epsilon: f64) {
        assert_eq!(a.len(), b.len());
        for (res, exp) in a.iter().zip(b.iter()) {
            for (r, e) in res.iter().zip(exp.iter()) {
                assert_relative_eq!(r, e, epsilon = epsilon);
            }
        }
    }

    #[test]
    fn test_compute_centroids() {
        let points1 = vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let points2 = vec![[7.0, 8.0, 9.0], [10.0, 11.0, 12.0], [13.0, 14.0, 15.0]];
        let (centroid1, centroid2) = compute_centroids(&points1, &points2);
        assert_relative_eq!(centroid1.x, 2.5, epsilon = 1e-12);
        assert_relative_eq!(centroid1.y, 3.5, epsilon = 1e-12);
        assert_relative_eq!(centroid1.z, 4.5, epsilon = 1e-12);
        assert_relative_eq!(centroid2.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(centroid2.y, 11.0, epsilon = 1e-12);
        assert_relative_eq!(centroid2.z, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_transformation_identity() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(0);
        let points_src = create_random_points(&mut rng, 30);
        let points_dst = points_src.clone();

        let transform = fit_transformation(&points_src, &points_dst)?;
        let identity = RigidTransform::identity();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(
                    transform.rotation()[i][j],
                    identity.rotation()[i][j],
                    epsilon = 1e-9
                );
            }
            assert_relative_eq!(transform.translation()[i], 0.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_fit_transformation_rotation() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(1);
        let points_src = create_random_points(&mut rng, 30);

        let expected_rotation =
            axis_angle_to_rotation_matrix(&[1.0, 0.0, 0.0], std::f64::consts::PI / 2.0)?;
        let expected = RigidTransform::from_parts(expected_rotation, [0.0, 0.0, 0.0])?;

        let mut points_dst = vec![[0.0; 3]; points_src.len()];
        expected.transform_points(&points_src, &mut points_dst)?;

        let transform = fit_transformation(&points_src, &points_dst)?;
        for (res, exp) in transform.rotation().iter().zip(expected_rotation.iter()) {
            for (r, e) in res.iter().zip(exp.iter()) {
                assert_relative_eq!(r, e, epsilon = 1e-9);
            }
        }
        for t in transform.translation() {
            assert_relative_eq!(*t, 0.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_fit_transformation_random() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(2);
        let num_points = 30;
        let points_src = create_random_points(&mut rng, num_points);

        for _ in 0..10 {
            let expected = create_random_transform(&mut rng, 1.0, 0.5)?;
            let mut points_dst = vec![[0.0; 3]; num_points];
            expected.transform_points(&points_src, &mut points_dst)?;

            let transform = fit_transformation(&points_src, &points_dst)?;
            let mut points_src_fit = vec![[0.0; 3]; num_points];
            transform.transform_points(&points_src, &mut points_src_fit)?;

            assert_points_eq(&points_src_fit, &points_dst, 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_fit_corresponding_points_with_transforms() -> Result<(), Box<dyn std::error::Error>>
    {
        let mut rng = StdRng::seed_from_u64(4);
        let num_points = 50;
        let subject = create_random_points(&mut rng, num_points);
        let target = create_random_points(&mut rng, num_points);

        let target_transform = create_random_transform(&mut rng, 0.5, 1.0)?;
        let mut target_moved = vec![[0.0; 3]; num_points];
        target_transform.transform_points(&target, &mut target_moved)?;

        // noiseless: the subject is an exact rigid copy of the moved target
        let truth = create_random_transform(&mut rng, 0.3, 0.2)?;
        let mut subject_exact = vec![[0.0; 3]; num_points];
        truth
            .inverse()
            .transform_points(&target_moved, &mut subject_exact)?;

        let subject_transform = create_random_transform(&mut rng, 0.1, 0.1)?;
        let refined = fit_corresponding_points(
            &subject_exact,
            &subject_transform,
            &target,
            &target_transform,
        )?;

        let mut subject_fit = vec![[0.0; 3]; num_points];
        refined.transform_points(&subject_exact, &mut subject_fit)?;
        assert_points_eq(&subject_fit, &target_moved, 1e-5);
        assert!(is_rotation_matrix(refined.rotation(), 1e-9));

        // unrelated subject still yields a proper rotation
        let unrelated = fit_corresponding_points(
            &subject,
            &RigidTransform::identity(),
            &target,
            &target_transform,
        )?;
        assert!(is_rotation_matrix(unrelated.rotation(), 1e-9));
        Ok(())
    }

    #[test]
    fn test_fit_degenerate_inputs() -> Result<(), Box<dyn std::error::Error>> {
        // coincident subject: zero covariance, identity rotation
        let subject = vec![[1.0, 1.0, 1.0]; 10];
        let target = (0..10).map(|i| [i as f64, 0.0, 0.0]).collect::<Vec<_>>();
        let transform = fit_transformation(&subject, &target)?;
        assert!(is_rotation_matrix(transform.rotation(), 1e-12));
        assert_relative_eq!(transform.rotation_angle(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(transform.translation()[0], 3.5, epsilon = 1e-12);
        assert_relative_eq!(transform.translation()[1], -1.0, epsilon = 1e-12);

        // colinear points: proper rotation mapping the line onto the target line
        let subject = (0..10).map(|i| [i as f64, 0.0, 0.0]).collect::<Vec<_>>();
        let target = (0..10).map(|i| [0.0, i as f64, 0.0]).collect::<Vec<_>>();
        let transform = fit_transformation(&subject, &target)?;
        assert!(is_rotation_matrix(transform.rotation(), 1e-9));
        let mut fitted = vec![[0.0; 3]; subject.len()];
        transform.transform_points(&subject, &mut fitted)?;
        assert_points_eq(&fitted, &target, 1e-9);

        // a single pair is a pure translation
        let transform = fit_transformation(&[[1.0, 2.0, 3.0]], &[[2.0, 2.0, 2.0]])?;
        assert_eq!(transform.translation(), &[1.0, 0.0, -1.0]);
        Ok(())
    }

    #[test]
    fn test_fit_invalid_input() {
        let res = fit_transformation(&[[0.0; 3]; 3], &[[0.0; 3]; 2]);
        assert!(matches!(
            res,
            Err(IcpError::MismatchedArrayLengths {
                left_len: 3,
                right_len: 2,
                ..
            })
        ));

        let res = fit_corresponding_points(
            &[],
            &RigidTransform::identity(),
            &[],
            &RigidTransform::identity(),
        );
        assert!(matches!(res, Err(IcpError::EmptyPointSet { name: "subject" })));

        let res = fit_transformation(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            &[[0.0, 0.0, 0.0], [1.0, f64::INFINITY, 0.0]],
        );
        assert!(matches!(res, Err(IcpError::NonFinitePoint { index: 1, .. })));
    }
}
