//! Baseline artifact retrieval from the artifact host.

use crate::error::{GateError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Source of the published baseline badge artifact.
///
/// One plain GET per call; retry policy lives in the orchestrator.
#[async_trait]
pub trait BaselineSource: Send + Sync {
    /// Fetch the artifact at `url` and return its raw bytes.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP implementation over the public artifact host.
pub struct HttpBaselineSource {
    client: reqwest::Client,
}

impl HttpBaselineSource {
    /// Build a client with the given per-call timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("covgate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BaselineSource for HttpBaselineSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url = %url, "Fetching baseline artifact");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GateError::Network(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GateError::NotFound(format!("GET {url} returned {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GateError::Network(format!("reading body of {url}: {e}")))?;

        if body.is_empty() {
            return Err(GateError::EmptyResponse(url.to_string()));
        }

        Ok(body.to_vec())
    }
}
