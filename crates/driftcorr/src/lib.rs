//! Point cloud registration for SLAM drift correction.
//!
//! A live point cloud is aligned against a static reference cloud held in a
//! [`icp::PointIndex`]; each call to [`icp::iterate`] performs one
//! Iterative Closest Point step and returns the refined rigid transform.

#[doc(inline)]
pub use driftcorr_3d as geometry;

#[doc(inline)]
pub use driftcorr_linalg as linalg;

#[doc(inline)]
pub use driftcorr_icp as icp;
