//! Commit status reporting to the review-system API.
//!
//! The gate is informational: measurements are posted with `state=success`
//! and the delta in the description, regardless of direction. Only a
//! pipeline failure downgrades the posted state to `error`.

use crate::error::{GateError, Result};
use crate::evaluate::RegressionVerdict;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Review-system description fields are capped at 140 characters.
const MAX_DESCRIPTION_LEN: usize = 140;

/// Commit status state, serialised the way the review API expects it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Success,
    Failure,
    Error,
    Pending,
}

/// JSON body of a commit status POST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusPayload {
    pub state: StatusState,
    pub target_url: String,
    pub description: String,
    pub context: String,
}

impl StatusPayload {
    /// Build a payload, truncating the description to the API's limit.
    pub fn new(state: StatusState, target_url: String, description: &str, context: &str) -> Self {
        let description = if description.len() > MAX_DESCRIPTION_LEN {
            let mut end = MAX_DESCRIPTION_LEN;
            while !description.is_char_boundary(end) {
                end -= 1;
            }
            description[..end].to_string()
        } else {
            description.to_string()
        };

        Self {
            state,
            target_url,
            description,
            context: context.to_string(),
        }
    }

    /// Measurement payload for a verdict: always `success`, delta in the
    /// description (`"<baseline>% -> <current>%"`).
    pub fn for_verdict(verdict: &RegressionVerdict, target_url: String, context: &str) -> Self {
        let description = format!(
            "{}% -> {}%",
            format_percentage(verdict.baseline),
            format_percentage(verdict.current)
        );
        Self::new(StatusState::Success, target_url, &description, context)
    }
}

/// Render a percentage with trailing zeros trimmed (`80.0` -> `80`,
/// `82.30` -> `82.3`), matching the published badge text.
pub fn format_percentage(value: f64) -> String {
    let mut text = format!("{value:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    text
}

/// Destination for commit statuses.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Post `payload` against `commit_sha`. One POST per call; safe to
    /// repeat (the review system treats identical statuses as a no-op).
    async fn post(&self, commit_sha: &str, payload: &StatusPayload) -> Result<()>;
}

/// GitHub-style review API client.
pub struct GithubStatusSink {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GithubStatusSink {
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("covgate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl StatusSink for GithubStatusSink {
    async fn post(&self, commit_sha: &str, payload: &StatusPayload) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/statuses/{}",
            self.api_base, self.owner, self.repo, commit_sha
        );
        debug!(url = %url, state = ?payload.state, "Posting commit status");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(|e| GateError::Transient(format!("POST {url}: {e}")))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                info!(sha = %commit_sha, state = ?payload.state, "Commit status accepted");
                Ok(())
            }
            401 | 403 => Err(GateError::Auth(format!(
                "review API rejected credentials ({status})"
            ))),
            404 => Err(GateError::NotFound(format!(
                "unknown commit or repository: {}/{}/{}",
                self.owner, self.repo, commit_sha
            ))),
            500..=599 => Err(GateError::Transient(format!(
                "review API returned {status}"
            ))),
            _ => Err(GateError::Transient(format!(
                "unexpected review API response {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::evaluate;

    #[test]
    fn test_format_percentage_trims_zeros() {
        assert_eq!(format_percentage(80.0), "80");
        assert_eq!(format_percentage(82.3), "82.3");
        assert_eq!(format_percentage(82.35), "82.35");
        assert_eq!(format_percentage(0.0), "0");
        assert_eq!(format_percentage(100.0), "100");
    }

    #[test]
    fn test_verdict_payload_description() {
        let verdict = evaluate(80.0, 82.3, 0.0).unwrap();
        let payload =
            StatusPayload::for_verdict(&verdict, "https://reports.example/42".into(), "coverage");
        assert_eq!(payload.description, "80% -> 82.3%");
        assert_eq!(payload.state, StatusState::Success);
        assert_eq!(payload.context, "coverage");
    }

    #[test]
    fn test_regression_still_posts_success() {
        // Informational gate: the measurement is reported, not enforced.
        let verdict = evaluate(90.0, 85.0, 0.0).unwrap();
        let payload = StatusPayload::for_verdict(&verdict, String::new(), "coverage");
        assert_eq!(payload.state, StatusState::Success);
        assert_eq!(payload.description, "90% -> 85%");
    }

    #[test]
    fn test_description_truncated_to_api_limit() {
        let long = "x".repeat(300);
        let payload = StatusPayload::new(StatusState::Error, String::new(), &long, "coverage");
        assert_eq!(payload.description.len(), 140);
    }

    #[test]
    fn test_state_serialises_lowercase() {
        let payload = StatusPayload::new(
            StatusState::Success,
            "https://example.com".into(),
            "80% -> 82.3%",
            "coverage",
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["state"], "success");
        assert_eq!(json["target_url"], "https://example.com");
    }
}
