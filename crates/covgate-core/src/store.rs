//! Object-store trait for the artifact host.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One object in a remote listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full key, including the listing prefix.
    pub key: String,
}

/// Bulk-sync surface of the artifact host.
///
/// Every operation is safe to repeat: puts are unconditional overwrites
/// and deletes of absent keys succeed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all objects whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    /// Write `bytes` at `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Remove the object at `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
