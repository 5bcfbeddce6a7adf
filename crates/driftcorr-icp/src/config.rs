use serde::{Deserialize, Serialize};

use crate::error::IcpError;

/// Stopping rule for [`IcpAligner::align`](crate::aligner::IcpAligner::align).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceCriteria {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance as the difference in RMSE between two consecutive iterations.
    pub tolerance: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-6,
        }
    }
}

/// Filter applied to the correspondences before fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum OutlierRejection {
    /// Keep every correspondence.
    #[default]
    None,
    /// Drop correspondences farther apart than the given Euclidean distance.
    MaxDistance(f64),
    /// Keep correspondences with distance <= median + k * 1.4826 * MAD.
    MedianAbsoluteDeviation(f64),
}

/// Configuration of an alignment session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// When to stop iterating.
    pub criteria: ConvergenceCriteria,
    /// Correspondence filter.
    pub rejection: OutlierRejection,
}

impl IcpConfig {
    /// Check that every parameter is within range.
    pub fn validate(&self) -> Result<(), IcpError> {
        if self.criteria.max_iterations == 0 {
            return Err(IcpError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.criteria.tolerance.is_finite() || self.criteria.tolerance < 0.0 {
            return Err(IcpError::InvalidConfig(format!(
                "tolerance must be finite and non-negative, got {}",
                self.criteria.tolerance
            )));
        }
        match self.rejection {
            OutlierRejection::None => {}
            OutlierRejection::MaxDistance(d) if !(d.is_finite() && d > 0.0) => {
                return Err(IcpError::InvalidConfig(format!(
                    "max distance must be positive and finite, got {d}"
                )));
            }
            OutlierRejection::MedianAbsoluteDeviation(k) if !(k.is_finite() && k > 0.0) => {
                return Err(IcpError::InvalidConfig(format!(
                    "MAD multiplier must be positive and finite, got {k}"
                )));
            }
            _ => {}
        }
        Ok(())
    }
}
