use driftcorr_3d::RigidTransform;

use crate::config::IcpConfig;
use crate::correspondence::{
    find_correspondences_into, mean_residual, reject_outliers, rmse, Correspondence,
};
use crate::error::IcpError;
use crate::fit::fit_delta;
use crate::iterate::correspondence_pairs;
use crate::point_index::PointIndex;

/// Outcome of a single [`IcpAligner::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpStep {
    /// Refined transform from the query frame to the reference frame.
    pub transform: RigidTransform,
    /// RMSE of the correspondences used, measured at the input transform.
    pub rmse: f64,
    /// Mean distance of the correspondences used, measured at the input transform.
    pub mean_residual: f64,
    /// Number of correspondences left after outlier rejection.
    pub num_correspondences: usize,
}

/// Result of the ICP algorithm.
///
/// The transformation is from the query to the reference frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpResult {
    /// Estimated transform.
    pub transform: RigidTransform,
    /// The total number of iterations performed.
    pub iterations: usize,
    /// Last computed RMSE.
    pub rmse: f64,
    /// Whether the RMSE change dropped below the tolerance.
    pub converged: bool,
}

/// Alignment session against a shared reference index.
///
/// The aligner borrows the index and owns a correspondence buffer that is
/// reused between iterations. Several aligners may share one index across
/// threads; a single aligner is driven by one caller at a time.
#[derive(Debug)]
pub struct IcpAligner<'a> {
    index: &'a PointIndex,
    config: IcpConfig,
    correspondences: Vec<Correspondence>,
}

impl<'a> IcpAligner<'a> {
    /// Create a session, validating the configuration.
    pub fn new(index: &'a PointIndex, config: IcpConfig) -> Result<Self, IcpError> {
        config.validate()?;
        Ok(Self {
            index,
            config,
            correspondences: Vec::new(),
        })
    }

    /// The reference index.
    pub fn index(&self) -> &'a PointIndex {
        self.index
    }

    /// The session configuration.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    /// Perform one iteration starting from `current`.
    ///
    /// Correspondences are searched, filtered by the configured outlier
    /// rejection and fitted. If no correspondence survives the filter the
    /// returned transform is `current` unchanged.
    pub fn step(
        &mut self,
        query: &[[f64; 3]],
        current: &RigidTransform,
    ) -> Result<IcpStep, IcpError> {
        self.correspondences
            .resize(query.len(), Correspondence::default());
        find_correspondences_into(query, current, self.index, &mut self.correspondences)?;
        reject_outliers(&mut self.correspondences, &self.config.rejection);

        if self.correspondences.is_empty() {
            log::warn!(
                "Outlier rejection {:?} discarded all {} correspondences",
                self.config.rejection,
                query.len()
            );
            return Ok(IcpStep {
                transform: *current,
                rmse: 0.0,
                mean_residual: 0.0,
                num_correspondences: 0,
            });
        }

        let (subject, target) = correspondence_pairs(&self.correspondences);
        let delta = fit_delta(&subject, &target)?;

        Ok(IcpStep {
            transform: delta.compose(current),
            rmse: rmse(&self.correspondences),
            mean_residual: mean_residual(&self.correspondences),
            num_correspondences: self.correspondences.len(),
        })
    }

    /// Iterate from `initial` until convergence or the iteration limit.
    ///
    /// Stops when the RMSE changes by less than the tolerance between two
    /// consecutive iterations, or when no correspondence survives rejection.
    pub fn align(
        &mut self,
        query: &[[f64; 3]],
        initial: &RigidTransform,
    ) -> Result<IcpResult, IcpError> {
        // initialize the result structure with the initial transformation given by the user
        let mut result = IcpResult {
            transform: *initial,
            iterations: 0,
            rmse: f64::INFINITY,
            converged: false,
        };

        for i in 0..self.config.criteria.max_iterations {
            log::debug!("Iteration: {}", i);
            let now = std::time::Instant::now();

            let step = self.step(query, &result.transform)?;
            result.iterations += 1;

            log::debug!("Num correspondences: {}", step.num_correspondences);

            if step.num_correspondences == 0 {
                break;
            }

            result.transform = step.transform;

            // check convergence and exit if below tolerance
            if (result.rmse - step.rmse).abs() < self.config.criteria.tolerance {
                log::debug!("ICP converged in {} iterations with error {}", i, step.rmse);
                result.rmse = step.rmse;
                result.converged = true;
                break;
            }

            result.rmse = step.rmse;

            log::debug!("rmse: {}, elapsed: {:?}", step.rmse, now.elapsed());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConvergenceCriteria, OutlierRejection};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn create_random_points(rng: &mut StdRng, num_points: usize) -> Vec<[f64; 3]> {
        (0..num_points)
            .map(|_| [rng.random(), rng.random(), rng.random()])
            .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() -> Result<(), IcpError> {
        let index = PointIndex::build(&[[0.0, 0.0, 0.0]])?;
        let config = IcpConfig {
            criteria: ConvergenceCriteria {
                max_iterations: 0,
                tolerance: 1e-6,
            },
            ..Default::default()
        };
        assert!(matches!(
            IcpAligner::new(&index, config),
            Err(IcpError::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn test_step_reports_residuals() -> Result<(), IcpError> {
        let reference = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let index = PointIndex::build(&reference)?;
        let mut aligner = IcpAligner::new(&index, IcpConfig::default())?;

        let query = vec![[0.0, 0.0, 0.1], [1.0, 0.0, 0.1], [0.0, 1.0, 0.1]];
        let step = aligner.step(&query, &RigidTransform::identity())?;
        assert_eq!(step.num_correspondences, 3);
        assert_relative_eq!(step.rmse, 0.1, epsilon = 1e-12);
        assert_relative_eq!(step.mean_residual, 0.1, epsilon = 1e-12);
        assert_relative_eq!(step.transform.translation()[2], -0.1, epsilon = 1e-9);

        // the scratch buffer adapts to a different query size
        let step = aligner.step(&query[..2], &RigidTransform::identity())?;
        assert_eq!(step.num_correspondences, 2);
        Ok(())
    }

    #[test]
    fn test_step_all_rejected_keeps_transform() -> Result<(), Box<dyn std::error::Error>> {
        let reference = (0..10).map(|i| [i as f64, 0.0, 0.0]).collect::<Vec<_>>();
        let index = PointIndex::build(&reference)?;
        let config = IcpConfig {
            rejection: OutlierRejection::MaxDistance(0.5),
            ..Default::default()
        };
        let mut aligner = IcpAligner::new(&index, config)?;

        let query = vec![[0.0, 5.0, 0.0], [3.0, 5.0, 0.0]];
        let current = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], 0.1, [0.0, 1.0, 0.0])?;
        let step = aligner.step(&query, &current)?;
        assert_eq!(step.num_correspondences, 0);
        assert_eq!(step.transform, current);

        let result = aligner.align(&query, &current)?;
        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
        assert_eq!(result.transform, current);
        Ok(())
    }

    #[test]
    fn test_align_converges() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(21);
        let reference = create_random_points(&mut rng, 1000);
        let index = PointIndex::build(&reference)?;

        let truth = RigidTransform::from_axis_angle(
            &[0.0, 0.0, 1.0],
            2f64.to_radians(),
            [0.02, -0.01, 0.015],
        )?;
        let mut query = vec![[0.0; 3]; 300];
        truth
            .inverse()
            .transform_points(&reference[..300], &mut query)?;

        let config = IcpConfig {
            criteria: ConvergenceCriteria {
                max_iterations: 50,
                tolerance: 1e-9,
            },
            ..Default::default()
        };
        let mut aligner = IcpAligner::new(&index, config)?;
        let result = aligner.align(&query, &RigidTransform::identity())?;

        assert!(result.converged);
        assert!(result.iterations <= 50);
        assert!(result.rmse < 1e-6);
        let error = result.transform.compose(&truth.inverse());
        assert!(error.rotation_angle() < 1e-4);
        for t in error.translation() {
            assert!(t.abs() < 1e-4);
        }
        Ok(())
    }

    #[test]
    fn test_align_with_outliers() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(33);
        let reference = create_random_points(&mut rng, 1000);
        let index = PointIndex::build(&reference)?;

        let truth = RigidTransform::from_translation([0.02, 0.0, -0.02]);
        let mut query = vec![[0.0; 3]; 400];
        truth
            .inverse()
            .transform_points(&reference[..400], &mut query)?;
        // far away clutter that has no counterpart in the reference
        query.extend((0..20).map(|i| [3.0 + i as f64 * 0.1, 3.0, 3.0]));

        let config = IcpConfig {
            criteria: ConvergenceCriteria {
                max_iterations: 50,
                tolerance: 1e-9,
            },
            rejection: OutlierRejection::MedianAbsoluteDeviation(3.0),
        };
        let mut aligner = IcpAligner::new(&index, config)?;
        let result = aligner.align(&query, &RigidTransform::identity())?;

        let error = result.transform.compose(&truth.inverse());
        assert!(error.rotation_angle() < 1e-3);
        for t in error.translation() {
            assert!(t.abs() < 1e-3);
        }
        Ok(())
    }
}
