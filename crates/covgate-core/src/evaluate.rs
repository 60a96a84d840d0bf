//! Regression evaluation: classify the delta between two measurements.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};

/// Direction of a coverage change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Improved,
    Unchanged,
    Regressed,
}

/// Outcome of comparing the current measurement against the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionVerdict {
    /// Published percentage for the reference branch.
    pub baseline: f64,

    /// Percentage just measured on this branch.
    pub current: f64,

    /// `current - baseline`.
    pub delta: f64,

    /// Sign of the delta, widened by the configured tolerance band.
    pub classification: Classification,
}

/// Compare two coverage percentages.
///
/// Pure function. `tolerance` widens the band treated as `Unchanged`;
/// the default of `0.0` means exact equality is the only tie. A negative
/// or non-finite tolerance is a configuration error.
pub fn evaluate(baseline: f64, current: f64, tolerance: f64) -> Result<RegressionVerdict> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(GateError::Config(format!(
            "tolerance must be a finite value >= 0, got {tolerance}"
        )));
    }

    let delta = current - baseline;
    let classification = if current < baseline - tolerance {
        Classification::Regressed
    } else if current > baseline + tolerance {
        Classification::Improved
    } else {
        Classification::Unchanged
    };

    Ok(RegressionVerdict {
        baseline,
        current,
        delta,
        classification,
    })
}
