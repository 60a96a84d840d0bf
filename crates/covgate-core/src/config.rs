//! Gate configuration.
//!
//! All values arrive from the CI environment (the CLI maps env vars onto
//! this struct). `validate` is the pipeline's pre-flight step: it runs
//! before any network call and rejects incomplete configuration without
//! side effects.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Object-store credentials and location for the artifact host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base endpoint of the artifact host, e.g. `https://objects.example.com`.
    pub endpoint: String,
    /// Target bucket.
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Full configuration for one gate run.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Review-system API base, e.g. `https://api.github.com`.
    pub review_api_base: String,
    /// Bearer token for the review-system API.
    pub review_token: String,
    /// `owner/repo` slug split into parts.
    pub owner: String,
    pub repo: String,

    /// Commit the status is posted against.
    pub commit_sha: String,
    /// CI run identifier, used in the human-viewable target URL.
    pub run_id: String,
    /// Pull/change-request number, when the run belongs to one.
    pub pull_number: Option<u64>,

    /// Branch/ref this run measures.
    pub current_ref: String,
    /// Reference branch the baseline is published for.
    pub baseline_ref: String,
    /// URL of the published baseline badge artifact.
    pub baseline_badge_url: String,

    /// Directory holding the freshly generated report (badge included).
    pub report_dir: PathBuf,
    /// Badge file within `report_dir` to measure the local percentage from.
    pub badge_file: String,
    /// Remote prefix the report is mirrored under on the baseline branch.
    pub remote_prefix: String,

    pub store: StoreConfig,

    /// Per-call HTTP timeout.
    pub http_timeout: Duration,
    /// Bounded retry attempts for retryable operations.
    pub max_attempts: u32,
    /// Width of the `Unchanged` band when classifying the delta.
    pub tolerance: f64,
}

impl GateConfig {
    /// Default per-call timeout.
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default retry budget.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default baseline branch name.
    pub const DEFAULT_BASELINE_REF: &'static str = "main";

    /// Whether this run is on the baseline branch (publish path) rather
    /// than a feature branch (compare path).
    pub fn on_baseline_ref(&self) -> bool {
        self.current_ref == self.baseline_ref
    }

    /// Pre-flight validation. Every required field must be present and
    /// well-formed before the pipeline performs any side effect.
    pub fn validate(&self) -> Result<()> {
        fn required(name: &str, value: &str) -> Result<()> {
            if value.trim().is_empty() {
                Err(GateError::Config(format!("{name} is required")))
            } else {
                Ok(())
            }
        }

        required("review_api_base", &self.review_api_base)?;
        required("review_token", &self.review_token)?;
        required("owner", &self.owner)?;
        required("repo", &self.repo)?;
        required("commit_sha", &self.commit_sha)?;
        required("run_id", &self.run_id)?;
        required("current_ref", &self.current_ref)?;
        required("baseline_ref", &self.baseline_ref)?;
        required("baseline_badge_url", &self.baseline_badge_url)?;
        required("store.endpoint", &self.store.endpoint)?;
        required("store.bucket", &self.store.bucket)?;
        required("store.access_key", &self.store.access_key)?;
        required("store.secret_key", &self.store.secret_key)?;
        required("store.region", &self.store.region)?;

        if self.max_attempts == 0 {
            return Err(GateError::Config("max_attempts must be >= 1".into()));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(GateError::Config(format!(
                "tolerance must be a finite value >= 0, got {}",
                self.tolerance
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GateConfig {
        GateConfig {
            review_api_base: "https://api.github.com".into(),
            review_token: "tok".into(),
            owner: "bo-editor".into(),
            repo: "bo".into(),
            commit_sha: "deadbeef".into(),
            run_id: "1234".into(),
            pull_number: Some(42),
            current_ref: "feature/x".into(),
            baseline_ref: "main".into(),
            baseline_badge_url: "https://objects.example.com/bo-reports/badge.svg".into(),
            report_dir: PathBuf::from("target/coverage"),
            badge_file: "badge.svg".into(),
            remote_prefix: "coverage".into(),
            store: StoreConfig {
                endpoint: "https://objects.example.com".into(),
                bucket: "bo-reports".into(),
                access_key: "AK".into(),
                secret_key: "SK".into(),
                region: "eu-west-1".into(),
            },
            http_timeout: GateConfig::DEFAULT_HTTP_TIMEOUT,
            max_attempts: GateConfig::DEFAULT_MAX_ATTEMPTS,
            tolerance: 0.0,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_missing_token_names_the_field() {
        let mut config = sample();
        config.review_token = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("review_token"));
    }

    #[test]
    fn test_missing_store_credentials() {
        let mut config = sample();
        config.store.secret_key = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
        assert!(err.to_string().contains("secret_key"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = sample();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_on_baseline_ref() {
        let mut config = sample();
        assert!(!config.on_baseline_ref());
        config.current_ref = "main".into();
        assert!(config.on_baseline_ref());
    }
}
