//! covgate-core - Coverage Regression Gate & Publisher
//!
//! Stateless CI step for the `bo` project that:
//! - Parses the coverage percentage out of the freshly generated badge
//! - Fetches the published baseline percentage for the reference branch
//! - Posts the delta as an informational commit status
//! - On the baseline branch, mirrors the report directory to the
//!   artifact host (upload-before-delete sync)

pub mod config;
pub mod error;
pub mod evaluate;
pub mod fakes;
pub mod fetch;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod retry;
pub mod status;
pub mod store;
pub mod store_http;
pub mod telemetry;

// Re-export key types
pub use config::{GateConfig, StoreConfig};
pub use error::{GateError, Result};
pub use evaluate::{evaluate, Classification, RegressionVerdict};
pub use fetch::{BaselineSource, HttpBaselineSource};
pub use pipeline::{GateOutcome, GatePipeline};
pub use publish::{ReportPublisher, SyncAction, SyncPlan, SyncSummary};
pub use report::{parse_percentage, CoverageReport, ReportSource};
pub use retry::{cancel_channel, retry, RetryPolicy};
pub use status::{GithubStatusSink, StatusPayload, StatusSink, StatusState};
pub use store::{ObjectStore, RemoteObject};
pub use store_http::HttpObjectStore;
