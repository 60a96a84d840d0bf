//! Gate pipeline orchestration.
//!
//! One invocation walks `Start -> Measuring -> Comparing | Publishing ->
//! Done | Failed`. On a feature branch the published baseline is fetched
//! and the measured delta posted as a commit status; on the baseline
//! branch the freshly generated report directory is mirrored to the
//! artifact host instead. The pipeline holds no durable state; the
//! artifact host is the only cross-run memory.

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::evaluate::{evaluate, RegressionVerdict};
use crate::fetch::BaselineSource;
use crate::publish::{ReportPublisher, SyncSummary};
use crate::report::{CoverageReport, ReportSource};
use crate::retry::{retry, RetryPolicy};
use crate::status::{StatusPayload, StatusSink, StatusState};
use crate::store::ObjectStore;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Status context the review UI groups our checks under.
const STATUS_CONTEXT: &str = "ci/coverage";

/// Terminal result of a successful run.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// Non-baseline ref: the measurement was posted.
    Compared { verdict: RegressionVerdict },
    /// Baseline ref: the report was mirrored.
    Published { summary: SyncSummary },
}

/// Orchestrates one gate run over the three external collaborators.
pub struct GatePipeline<'a> {
    config: &'a GateConfig,
    baseline: &'a dyn BaselineSource,
    status: &'a dyn StatusSink,
    store: &'a dyn ObjectStore,
}

impl<'a> GatePipeline<'a> {
    pub fn new(
        config: &'a GateConfig,
        baseline: &'a dyn BaselineSource,
        status: &'a dyn StatusSink,
        store: &'a dyn ObjectStore,
    ) -> Self {
        Self {
            config,
            baseline,
            status,
            store,
        }
    }

    /// Execute the run. Cancellation is observed between retry attempts
    /// and sync steps.
    pub async fn run(&self, cancel: &mut watch::Receiver<bool>) -> Result<GateOutcome> {
        // Start: pre-flight, no side effects yet.
        self.config.validate()?;

        info!(
            sha = %self.config.commit_sha,
            current_ref = %self.config.current_ref,
            baseline_ref = %self.config.baseline_ref,
            "Starting coverage gate"
        );

        if self.config.on_baseline_ref() {
            self.publish_path(cancel).await
        } else {
            self.compare_path(cancel).await
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_attempts, Duration::from_millis(500))
    }

    /// Measuring: parse the just-generated local badge.
    async fn measure_local(&self) -> Result<CoverageReport> {
        let badge_path = self.config.report_dir.join(&self.config.badge_file);
        let raw = tokio::fs::read(&badge_path).await.map_err(|e| {
            GateError::Parse(format!(
                "cannot read local badge {}: {e}",
                badge_path.display()
            ))
        })?;
        CoverageReport::from_artifact(raw, ReportSource::Local)
    }

    /// Comparing: fetch baseline and local measurement (independent, so
    /// issued concurrently), evaluate, post the verdict.
    async fn compare_path(&self, cancel: &mut watch::Receiver<bool>) -> Result<GateOutcome> {
        info!(state = "comparing", "Measuring against published baseline");

        let result = {
            let mut fetch_cancel = cancel.clone();
            let url = &self.config.baseline_badge_url;
            let policy = self.retry_policy();
            let fetch_baseline = async move {
                let raw = retry(policy, &mut fetch_cancel, "fetch_baseline", || async move {
                    self.baseline.fetch(url).await
                })
                .await?;
                CoverageReport::from_artifact(raw, ReportSource::Remote)
            };
            tokio::try_join!(fetch_baseline, self.measure_local())
        };

        let (remote, local) = match result {
            Ok(pair) => pair,
            Err(err) => {
                // Best-effort: surface the failure in the review UI, then
                // end the run Failed.
                self.post_error_status(cancel, &err).await;
                return Err(err);
            }
        };

        let verdict = evaluate(remote.percentage(), local.percentage(), self.config.tolerance)?;
        info!(
            baseline = verdict.baseline,
            current = verdict.current,
            delta = verdict.delta,
            classification = ?verdict.classification,
            "Coverage evaluated"
        );

        let payload = StatusPayload::for_verdict(&verdict, self.target_url(), STATUS_CONTEXT);
        let payload = &payload;
        let policy = self.retry_policy();
        retry(policy, cancel, "post_status", || async move {
            self.status.post(&self.config.commit_sha, payload).await
        })
        .await?;

        Ok(GateOutcome::Compared { verdict })
    }

    /// Publishing: mirror the report directory under the remote prefix.
    async fn publish_path(&self, cancel: &mut watch::Receiver<bool>) -> Result<GateOutcome> {
        info!(state = "publishing", dir = %self.config.report_dir.display(), "Publishing report");

        // The local badge must parse before we overwrite the published one.
        let local = self.measure_local().await?;
        info!(percentage = local.percentage(), "Local coverage measured");

        let publisher = ReportPublisher::new(self.store, self.retry_policy());
        let summary = publisher
            .publish(&self.config.report_dir, &self.config.remote_prefix, cancel)
            .await?;

        info!(
            uploaded = summary.uploaded,
            deleted = summary.deleted,
            "Report published"
        );
        Ok(GateOutcome::Published { summary })
    }

    /// Best-effort `state=error` status so a broken run is visible in the
    /// review UI, not only in logs. Failures here are logged and dropped.
    async fn post_error_status(&self, cancel: &mut watch::Receiver<bool>, cause: &GateError) {
        if matches!(cause, GateError::Cancelled) {
            return;
        }
        let payload = StatusPayload::new(
            StatusState::Error,
            self.target_url(),
            &format!("coverage gate failed: {cause}"),
            STATUS_CONTEXT,
        );
        let payload = &payload;
        let policy = self.retry_policy();
        let posted = retry(policy, cancel, "post_error_status", || async move {
            self.status.post(&self.config.commit_sha, payload).await
        })
        .await;
        if let Err(err) = posted {
            warn!(error = %err, "Could not report failure to review system");
        }
    }

    /// Human-viewable report page, keyed by pull/run identifiers.
    fn target_url(&self) -> String {
        let base = format!(
            "{}/{}",
            self.config.store.endpoint.trim_end_matches('/'),
            self.config.store.bucket
        );
        match self.config.pull_number {
            Some(pull) => format!("{base}/pr-{pull}/{}/index.html", self.config.run_id),
            None => format!("{base}/{}/index.html", self.config.run_id),
        }
    }
}
