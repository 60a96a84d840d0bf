//! covgate - coverage regression gate for the `bo` CI pipeline.
//!
//! On a feature branch: fetches the published baseline coverage, parses
//! the local badge, and posts the delta as an informational commit
//! status. On the baseline branch: mirrors the generated report
//! directory to the artifact host.
//!
//! ## Exit codes (stable)
//!
//! - `0` — run completed (`Done`)
//! - `1` — runtime failure (network, parse, auth, partial publish)
//! - `2` — configuration error (detected pre-flight, no side effects)

use clap::Parser;
use covgate_core::telemetry::init_tracing;
use covgate_core::{
    cancel_channel, GateConfig, GateError, GateOutcome, GatePipeline, GithubStatusSink,
    HttpBaselineSource, HttpObjectStore, StoreConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, Level};

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[derive(Parser)]
#[command(name = "covgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Coverage regression gate and report publisher", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Review-system API base URL
    #[arg(long, env = "COVGATE_REVIEW_API", default_value = "https://api.github.com")]
    review_api: String,

    /// Bearer token for the review-system API
    #[arg(long, env = "COVGATE_REVIEW_TOKEN", hide_env_values = true)]
    review_token: String,

    /// Repository owner
    #[arg(long, env = "COVGATE_OWNER")]
    owner: String,

    /// Repository name
    #[arg(long, env = "COVGATE_REPO")]
    repo: String,

    /// Commit SHA the status is posted against
    #[arg(long, env = "COVGATE_COMMIT_SHA")]
    commit_sha: String,

    /// CI run identifier
    #[arg(long, env = "COVGATE_RUN_ID")]
    run_id: String,

    /// Pull-request number, when this run belongs to one
    #[arg(long, env = "COVGATE_PULL_NUMBER")]
    pull_number: Option<u64>,

    /// Branch/ref this run measures
    #[arg(long, env = "COVGATE_CURRENT_REF")]
    current_ref: String,

    /// Baseline branch the published report belongs to
    #[arg(long, env = "COVGATE_BASELINE_REF", default_value = "main")]
    baseline_ref: String,

    /// URL of the published baseline badge
    #[arg(long, env = "COVGATE_BASELINE_BADGE_URL")]
    baseline_badge_url: String,

    /// Local directory holding the generated coverage report
    #[arg(long, env = "COVGATE_REPORT_DIR")]
    report_dir: PathBuf,

    /// Badge file inside the report directory
    #[arg(long, env = "COVGATE_BADGE_FILE", default_value = "badge.svg")]
    badge_file: String,

    /// Remote prefix the report is mirrored under
    #[arg(long, env = "COVGATE_REMOTE_PREFIX", default_value = "coverage")]
    remote_prefix: String,

    /// Artifact-host endpoint
    #[arg(long, env = "COVGATE_STORE_ENDPOINT")]
    store_endpoint: String,

    /// Target bucket on the artifact host
    #[arg(long, env = "COVGATE_STORE_BUCKET")]
    store_bucket: String,

    /// Artifact-host access key
    #[arg(long, env = "COVGATE_STORE_ACCESS_KEY", hide_env_values = true)]
    store_access_key: String,

    /// Artifact-host secret key
    #[arg(long, env = "COVGATE_STORE_SECRET_KEY", hide_env_values = true)]
    store_secret_key: String,

    /// Artifact-host region
    #[arg(long, env = "COVGATE_STORE_REGION", default_value = "eu-west-1")]
    store_region: String,

    /// Per-call HTTP timeout in seconds
    #[arg(long, env = "COVGATE_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,

    /// Retry attempts for transient failures
    #[arg(long, env = "COVGATE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Coverage-delta band still classified as unchanged
    #[arg(long, env = "COVGATE_TOLERANCE", default_value_t = 0.0)]
    tolerance: f64,
}

impl Cli {
    fn into_config(self) -> GateConfig {
        GateConfig {
            review_api_base: self.review_api,
            review_token: self.review_token,
            owner: self.owner,
            repo: self.repo,
            commit_sha: self.commit_sha,
            run_id: self.run_id,
            pull_number: self.pull_number,
            current_ref: self.current_ref,
            baseline_ref: self.baseline_ref,
            baseline_badge_url: self.baseline_badge_url,
            report_dir: self.report_dir,
            badge_file: self.badge_file,
            remote_prefix: self.remote_prefix,
            store: StoreConfig {
                endpoint: self.store_endpoint,
                bucket: self.store_bucket,
                access_key: self.store_access_key,
                secret_key: self.store_secret_key,
                region: self.store_region,
            },
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            max_attempts: self.max_attempts,
            tolerance: self.tolerance,
        }
    }
}

async fn run(config: GateConfig) -> Result<GateOutcome, GateError> {
    let timeout = config.http_timeout;
    let baseline = HttpBaselineSource::new(timeout)?;
    let status = GithubStatusSink::new(
        &config.review_api_base,
        &config.owner,
        &config.repo,
        &config.review_token,
        timeout,
    )?;
    let store = HttpObjectStore::new(config.store.clone(), timeout)?;

    let (cancel_tx, mut cancel_rx) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let pipeline = GatePipeline::new(&config, &baseline, &status, &store);
    pipeline.run(&mut cancel_rx).await
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = cli.into_config();
    match run(config).await {
        Ok(GateOutcome::Compared { verdict }) => {
            info!(
                baseline = verdict.baseline,
                current = verdict.current,
                delta = verdict.delta,
                "Gate done: measurement reported"
            );
            Ok(ExitCode::SUCCESS)
        }
        Ok(GateOutcome::Published { summary }) => {
            info!(
                uploaded = summary.uploaded,
                deleted = summary.deleted,
                "Gate done: report published"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ GateError::Config(_)) => {
            error!(error = %err, "Configuration rejected");
            Ok(ExitCode::from(EXIT_CONFIG))
        }
        Err(err) => {
            error!(error = %err, "Gate failed");
            Ok(ExitCode::from(EXIT_FAILED))
        }
    }
}
