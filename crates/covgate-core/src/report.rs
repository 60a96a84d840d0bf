//! Coverage report model and badge-text parsing.
//!
//! The published artifact is an SVG badge containing a human-readable
//! `coverage: NN.NN%` substring. The parser scans for that literal rather
//! than parsing the surrounding markup, so it works against any artifact
//! that embeds the token.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};

/// Where a coverage measurement came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Fetched from the artifact host (the published baseline).
    Remote,
    /// Produced by the current run's instrumentation.
    Local,
}

/// A single coverage measurement tied to the artifact it was parsed from.
///
/// The percentage is always derived from `raw_artifact`; construct via
/// [`CoverageReport::from_artifact`].
#[derive(Debug, Clone)]
pub struct CoverageReport {
    percentage: f64,
    source: ReportSource,
    raw_artifact: Vec<u8>,
}

impl CoverageReport {
    /// Parse an artifact's bytes into a report. Fails with
    /// [`GateError::Parse`] when no valid percentage is embedded.
    pub fn from_artifact(raw_artifact: Vec<u8>, source: ReportSource) -> Result<Self> {
        let percentage = parse_percentage(&raw_artifact)?;
        Ok(Self {
            percentage,
            source,
            raw_artifact,
        })
    }

    /// Coverage percentage in `[0, 100]`.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    pub fn source(&self) -> ReportSource {
        self.source
    }

    /// The artifact bytes this measurement was parsed from.
    pub fn raw_artifact(&self) -> &[u8] {
        &self.raw_artifact
    }
}

/// Token that precedes the percentage inside the badge text.
const COVERAGE_TOKEN: &str = "coverage:";

/// Extract the coverage percentage from a badge artifact.
///
/// Scanning contract (kept stable for interoperability with the existing
/// badge format):
/// - the first case-insensitive occurrence of the literal `coverage:` wins
/// - the numeric segment runs from the token to the next `%` character
/// - surrounding whitespace is stripped before parsing as a decimal
///
/// Fails with [`GateError::Parse`] when the token is absent, no `%`
/// terminator follows it, the segment is not a number, or the value lies
/// outside `[0, 100]`.
pub fn parse_percentage(raw: &[u8]) -> Result<f64> {
    let text = String::from_utf8_lossy(raw);
    // ASCII lowering keeps byte offsets stable between the two strings.
    let lowered = text.to_ascii_lowercase();

    let token_at = lowered
        .find(COVERAGE_TOKEN)
        .ok_or_else(|| GateError::Parse(format!("token '{COVERAGE_TOKEN}' not found")))?;
    let after = &text[token_at + COVERAGE_TOKEN.len()..];

    let percent_at = after
        .find('%')
        .ok_or_else(|| GateError::Parse("no '%' terminator after coverage token".into()))?;
    let segment = after[..percent_at].trim();

    let value: f64 = segment
        .parse()
        .map_err(|_| GateError::Parse(format!("malformed percentage segment '{segment}'")))?;

    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(GateError::Parse(format!(
            "percentage {value} outside [0, 100]"
        )));
    }

    Ok(value)
}
