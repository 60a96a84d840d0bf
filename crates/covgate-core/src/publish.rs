//! Report publishing: mirror a local directory tree to the artifact host.
//!
//! The plan is a diff keyed by path relative to the local root / remote
//! prefix: every local file becomes one Upload (unconditional overwrite),
//! every remote-only key becomes one Delete. Uploads run before deletes so
//! unchanged files never disappear from consumers mid-sync. Publishing is
//! not transactional; a failed run leaves already-synced objects in place
//! and the next run converges.

use crate::error::{GateError, Result};
use crate::retry::{retry, RetryPolicy};
use crate::store::ObjectStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

/// One step of a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Upload the file at `local_path` to `key`.
    Upload { local_path: PathBuf, key: String },
    /// Remove the stale remote object at `key`.
    Delete { key: String },
}

/// Ordered steps to converge the remote prefix onto the local tree.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
}

impl SyncPlan {
    /// Diff `local_dir` (recursive) against `remote_keys` under `prefix`.
    /// Uploads are ordered before deletes.
    pub fn diff(
        local_dir: &Path,
        prefix: &str,
        remote_keys: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let mut local_files = Vec::new();
        collect_files(local_dir, local_dir, &mut local_files)?;
        // Deterministic plan order regardless of directory iteration order.
        local_files.sort();

        let mut actions = Vec::new();
        let mut local_keys = BTreeSet::new();
        for relative in &local_files {
            let key = join_key(prefix, relative);
            local_keys.insert(key.clone());
            actions.push(SyncAction::Upload {
                local_path: local_dir.join(relative),
                key,
            });
        }

        let remote: BTreeSet<String> = remote_keys.into_iter().collect();
        for key in remote {
            if !local_keys.contains(&key) {
                actions.push(SyncAction::Delete { key });
            }
        }

        Ok(Self { actions })
    }

    pub fn upload_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, SyncAction::Upload { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, SyncAction::Delete { .. }))
            .count()
    }
}

/// Outcome of a completed publish.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub uploaded: usize,
    pub deleted: usize,
    pub completed_at: DateTime<Utc>,
}

/// Executes a [`SyncPlan`] against an [`ObjectStore`].
pub struct ReportPublisher<'a> {
    store: &'a dyn ObjectStore,
    policy: RetryPolicy,
}

impl<'a> ReportPublisher<'a> {
    pub fn new(store: &'a dyn ObjectStore, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Mirror `local_dir` under `remote_prefix`.
    ///
    /// Each object operation gets its own bounded retry. Operations that
    /// exhaust their budget are collected; the publish then fails with
    /// [`GateError::PartialPublish`] naming the failed keys. Succeeded
    /// operations are never rolled back.
    pub async fn publish(
        &self,
        local_dir: &Path,
        remote_prefix: &str,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<SyncSummary> {
        let remote = retry(self.policy, cancel, "list", || async move {
            self.store.list(remote_prefix).await
        })
        .await?;

        let plan = SyncPlan::diff(
            local_dir,
            remote_prefix,
            remote.into_iter().map(|o| o.key),
        )?;
        info!(
            uploads = plan.upload_count(),
            deletes = plan.delete_count(),
            prefix = %remote_prefix,
            "Executing sync plan"
        );

        let mut uploaded = 0usize;
        let mut deleted = 0usize;
        let mut failed_keys = Vec::new();

        for action in &plan.actions {
            if *cancel.borrow() {
                return Err(GateError::Cancelled);
            }
            match action {
                SyncAction::Upload { local_path, key } => {
                    let result = retry(self.policy, cancel, key, || async move {
                        let bytes = tokio::fs::read(local_path).await?;
                        self.store.put(key, bytes).await
                    })
                    .await;
                    match result {
                        Ok(()) => uploaded += 1,
                        Err(GateError::Cancelled) => return Err(GateError::Cancelled),
                        Err(err) => {
                            warn!(key = %key, error = %err, "Upload failed permanently");
                            failed_keys.push(key.clone());
                        }
                    }
                }
                SyncAction::Delete { key } => {
                    let result = retry(self.policy, cancel, key, || async move {
                        self.store.delete(key).await
                    })
                    .await;
                    match result {
                        Ok(()) => deleted += 1,
                        Err(GateError::Cancelled) => return Err(GateError::Cancelled),
                        Err(err) => {
                            warn!(key = %key, error = %err, "Delete failed permanently");
                            failed_keys.push(key.clone());
                        }
                    }
                }
            }
        }

        if !failed_keys.is_empty() {
            return Err(GateError::PartialPublish { failed_keys });
        }

        Ok(SyncSummary {
            uploaded,
            deleted,
            completed_at: Utc::now(),
        })
    }
}

/// Prefix-join that tolerates an empty prefix and trailing slashes.
fn join_key(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}

/// Walk `dir` recursively, pushing paths relative to `root` with `/`
/// separators (object keys are slash-delimited on every platform).
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| GateError::Config(format!("path outside report dir: {e}")))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(key);
        }
    }
    Ok(())
}
