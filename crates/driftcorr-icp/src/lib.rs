#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Alignment sessions driving repeated iterations.
pub mod aligner;

/// Session configuration.
pub mod config;

/// Nearest-neighbour correspondences and residual metrics.
pub mod correspondence;

mod error;
pub use error::IcpError;

/// Least-squares rigid fitting of corresponding point sets.
pub mod fit;

mod iterate;
pub use iterate::iterate;

/// Spatial index over the reference points.
pub mod point_index;

pub use aligner::{IcpAligner, IcpResult, IcpStep};
pub use config::{ConvergenceCriteria, IcpConfig, OutlierRejection};
pub use correspondence::{find_correspondences, find_correspondences_into, Correspondence};
pub use fit::{compute_centroids, fit_corresponding_points, fit_transformation};
pub use point_index::{Neighbor, PendingIndex, PointIndex};
