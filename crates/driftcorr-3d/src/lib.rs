#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// Rigid transform type.
pub mod rigid;

/// 3D transforms algorithms.
pub mod transforms;

/// Conversions between plain arrays and glam types.
pub mod utils;

pub use rigid::RigidTransform;
pub use transforms::TransformError;
