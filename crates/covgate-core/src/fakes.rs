//! In-memory fakes for the external collaborators (testing only)
//!
//! Provides `MemoryBaselineSource`, `RecordingStatusSink`, and
//! `MemoryObjectStore` that satisfy the trait contracts without any
//! network dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{GateError, Result};
use crate::fetch::BaselineSource;
use crate::status::{StatusPayload, StatusSink};
use crate::store::{ObjectStore, RemoteObject};

// ---------------------------------------------------------------------------
// MemoryBaselineSource
// ---------------------------------------------------------------------------

/// Baseline source serving canned responses keyed by URL.
#[derive(Debug, Default)]
pub struct MemoryBaselineSource {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    /// Errors to fail with before serving, consumed one per call.
    failures: Mutex<Vec<GateError>>,
}

impl MemoryBaselineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, bytes: &[u8]) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    /// Queue an error for the next fetch calls (front first).
    pub fn fail_next(&self, err: GateError) {
        self.failures.lock().unwrap().push(err);
    }
}

#[async_trait]
impl BaselineSource for MemoryBaselineSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(err) = {
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        } {
            return Err(err);
        }

        self.artifacts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| GateError::NotFound(format!("GET {url} returned 404 Not Found")))
    }
}

// ---------------------------------------------------------------------------
// RecordingStatusSink
// ---------------------------------------------------------------------------

/// Status sink that records every payload instead of posting it.
#[derive(Debug, Default)]
pub struct RecordingStatusSink {
    posted: Mutex<Vec<(String, StatusPayload)>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(commit_sha, payload)` pairs posted so far.
    pub fn posted(&self) -> Vec<(String, StatusPayload)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
    async fn post(&self, commit_sha: &str, payload: &StatusPayload) -> Result<()> {
        self.posted
            .lock()
            .unwrap()
            .push((commit_sha.to_string(), payload.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory object store backed by a `HashMap<key, bytes>`, with an
/// optional per-key failure budget to exercise retry paths.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    /// Remaining failures per key; each matching put/delete consumes one.
    flaky: Mutex<HashMap<String, u32>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }

    /// Make the next `count` mutations of `key` fail with `Transient`.
    pub fn fail_times(&self, key: &str, count: u32) {
        self.flaky.lock().unwrap().insert(key.to_string(), count);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check_flaky(&self, key: &str) -> Result<()> {
        let mut flaky = self.flaky.lock().unwrap();
        if let Some(remaining) = flaky.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GateError::Transient(format!("injected failure for {key}")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let objects = self.objects.lock().unwrap();
        let mut listed: Vec<_> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(|k| RemoteObject { key: k.clone() })
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.check_flaky(key)?;
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_flaky(key)?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}
