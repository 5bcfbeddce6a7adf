use driftcorr_3d::TransformError;
use driftcorr_linalg::rigid::RigidError;
use thiserror::Error;

/// Error types for the registration engine.
///
/// Every variant describes invalid input. Numerical degeneracy (coincident or
/// colinear points) is handled by the solver and never surfaces here.
#[derive(Debug, Error)]
pub enum IcpError {
    /// A point set that must contain at least one point is empty.
    #[error("Point set `{name}` is empty")]
    EmptyPointSet {
        /// Label of the offending point set
        name: &'static str,
    },

    /// Invalid input data - mismatched array lengths with descriptive labels.
    #[error("Mismatched array lengths: {left_name} ({left_len}) != {right_name} ({right_len})")]
    MismatchedArrayLengths {
        /// Label for the left-hand slice
        left_name: &'static str,
        /// Length of the left-hand slice
        left_len: usize,
        /// Label for the right-hand slice
        right_name: &'static str,
        /// Length of the right-hand slice
        right_len: usize,
    },

    /// A point has a NaN or infinite coordinate.
    #[error("Point {index} has a non-finite coordinate: {point:?}")]
    NonFinitePoint {
        /// Position of the point in its input slice
        index: usize,
        /// The offending point
        point: [f64; 3],
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background index build thread could not be started.
    #[error("Failed to spawn point index build thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// The background index build thread panicked.
    #[error("Point index build thread panicked")]
    IndexBuildPanicked,

    /// Error from the rigid transform primitives.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl From<RigidError> for IcpError {
    fn from(err: RigidError) -> Self {
        match err {
            RigidError::MismatchedInputLengths(left_len, right_len) => {
                IcpError::MismatchedArrayLengths {
                    left_name: "subject",
                    left_len,
                    right_name: "target",
                    right_len,
                }
            }
            RigidError::EmptyInput => IcpError::EmptyPointSet { name: "subject" },
        }
    }
}

/// Fail with [`IcpError::EmptyPointSet`] when `points` is empty.
pub(crate) fn ensure_non_empty<T>(points: &[T], name: &'static str) -> Result<(), IcpError> {
    if points.is_empty() {
        return Err(IcpError::EmptyPointSet { name });
    }
    Ok(())
}

/// Fail with [`IcpError::MismatchedArrayLengths`] unless both slices have the same length.
pub(crate) fn ensure_same_len<A, B>(
    left: &[A],
    left_name: &'static str,
    right: &[B],
    right_name: &'static str,
) -> Result<(), IcpError> {
    if left.len() != right.len() {
        return Err(IcpError::MismatchedArrayLengths {
            left_name,
            left_len: left.len(),
            right_name,
            right_len: right.len(),
        });
    }
    Ok(())
}

/// Fail with [`IcpError::NonFinitePoint`] on the first point with a NaN or infinite coordinate.
pub(crate) fn ensure_all_finite(points: &[[f64; 3]]) -> Result<(), IcpError> {
    match points
        .iter()
        .enumerate()
        .find(|(_, p)| !p.iter().all(|c| c.is_finite()))
    {
        Some((index, point)) => Err(IcpError::NonFinitePoint {
            index,
            point: *point,
        }),
        None => Ok(()),
    }
}
