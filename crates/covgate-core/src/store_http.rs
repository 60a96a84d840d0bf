//! HTTP client for the artifact host's object API.
//!
//! Talks the plain bucket-HTTP surface: `GET {endpoint}/{bucket}?prefix=`
//! returns a JSON array of `{"key": ...}` objects, `PUT`/`DELETE`
//! `{endpoint}/{bucket}/{key}` mutate single objects. Credentials travel
//! as headers; request signing is the host's concern.

use crate::config::StoreConfig;
use crate::error::{GateError, Result};
use crate::store::{ObjectStore, RemoteObject};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const ACCESS_KEY_HEADER: &str = "x-store-access-key";
const SECRET_KEY_HEADER: &str = "x-store-secret-key";
const REGION_HEADER: &str = "x-store-region";

/// Artifact-host client over reqwest.
pub struct HttpObjectStore {
    client: reqwest::Client,
    config: StoreConfig,
}

impl HttpObjectStore {
    pub fn new(config: StoreConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("covgate/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_url(), key)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header(ACCESS_KEY_HEADER, &self.config.access_key)
            .header(SECRET_KEY_HEADER, &self.config.secret_key)
            .header(REGION_HEADER, &self.config.region)
    }

    fn map_status(status: reqwest::StatusCode, what: &str) -> Result<()> {
        match status.as_u16() {
            200..=299 => Ok(()),
            401 | 403 => Err(GateError::Auth(format!(
                "artifact host rejected credentials for {what} ({status})"
            ))),
            404 => Err(GateError::NotFound(what.to_string())),
            500..=599 => Err(GateError::Transient(format!("{what} returned {status}"))),
            _ => Err(GateError::Transient(format!(
                "{what} returned unexpected {status}"
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let url = self.bucket_url();
        debug!(bucket = %self.config.bucket, prefix = %prefix, "Listing remote objects");

        let response = self
            .authed(self.client.get(&url).query(&[("prefix", prefix)]))
            .send()
            .await
            .map_err(|e| GateError::Network(format!("LIST {url}: {e}")))?;

        let status = response.status();
        if status.as_u16() == 404 {
            // An empty namespace lists as empty, not as an error.
            return Ok(Vec::new());
        }
        Self::map_status(status, &format!("LIST {url}"))?;

        let objects: Vec<RemoteObject> = response
            .json()
            .await
            .map_err(|e| GateError::Parse(format!("malformed listing from {url}: {e}")))?;
        Ok(objects)
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.object_url(key);
        debug!(key = %key, size = bytes.len(), "Uploading object");

        let response = self
            .authed(self.client.put(&url).body(bytes))
            .send()
            .await
            .map_err(|e| GateError::Transient(format!("PUT {url}: {e}")))?;
        Self::map_status(response.status(), &format!("PUT {url}"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let url = self.object_url(key);
        debug!(key = %key, "Deleting object");

        let response = self
            .authed(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| GateError::Transient(format!("DELETE {url}: {e}")))?;

        // Absent keys delete cleanly.
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        Self::map_status(response.status(), &format!("DELETE {url}"))
    }
}
