#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Rigid alignment of corresponding point sets.
pub mod rigid;

/// Module to calculate SVD of a 3x3 matrix
pub mod svd;
