//! High-level runner API for the model run adapter.
//!
//! This module hides the wiring needed to stand up a lifecycle manager: choosing
//! the storage backend, building the S3 client for an S3-compatible endpoint and
//! installing the telemetry channel.
//!
//! This is the primary API for the CLI and for request layers embedding the crate.

use anyhow::{Context, Result, bail};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use aws_types::SdkConfig;
use derive_builder::Builder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{DEFAULT_REGION, STATUS_POLL_TIMEOUT};
use crate::io::{LocalFileSink, S3Sink, StorageSink};
use crate::lifecycle::{
    InlineOnly, LifecycleManager, ModelState, Passthrough, ResultProcessor, RunConfig, RunInfo,
};
use crate::telemetry::{LifecycleEvent, LifecycleStats};

/// Storage and polling settings for a lifecycle manager
///
/// Leaving `object_store_endpoint` unset selects the local-file backend.
#[derive(Builder, Debug, Clone)]
pub struct AdapterArgs {
    /// `host:port` or full URL of an S3-compatible service (e.g. MinIO)
    #[builder(default, setter(into, strip_option))]
    pub object_store_endpoint: Option<String>,
    #[builder(default, setter(into, strip_option))]
    pub access_key: Option<String>,
    #[builder(default, setter(into, strip_option))]
    pub secret_key: Option<String>,
    #[builder(default = "DEFAULT_REGION.to_string()", setter(into))]
    pub region: String,
    /// Use https when the endpoint has no scheme
    #[builder(default)]
    pub secure: bool,
    #[builder(default = "STATUS_POLL_TIMEOUT")]
    pub status_timeout: Duration,
}

impl AdapterArgs {
    fn endpoint_url(&self) -> Option<String> {
        self.object_store_endpoint.as_ref().map(|endpoint| {
            if endpoint.contains("://") {
                endpoint.clone()
            } else {
                let scheme = if self.secure { "https" } else { "http" };
                format!("{}://{}", scheme, endpoint)
            }
        })
    }
}

/// Build an S3 client with path-style addressing, as S3-compatible stores expect
fn s3_client(sdk_config: &SdkConfig) -> S3Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(true)
        .build();
    S3Client::from_conf(s3_config)
}

/// Create the storage sink selected by `args`
///
/// For the object-store backend this also lists the visible buckets, which
/// doubles as a connectivity check.
pub async fn build_sink(args: &AdapterArgs) -> Result<Arc<dyn StorageSink>> {
    let Some(endpoint_url) = args.endpoint_url() else {
        info!("No object store configured, writing results to local files");
        return Ok(Arc::new(LocalFileSink::new()));
    };

    info!("Connecting to object store at {}", endpoint_url);

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(args.region.clone()))
        .endpoint_url(&endpoint_url);

    match (&args.access_key, &args.secret_key) {
        (Some(access_key), Some(secret_key)) => {
            config_loader = config_loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "model-run-adapter",
            ));
        }
        (None, None) => {}
        _ => bail!("Object store access key and secret key must be given together"),
    }

    let sdk_config = config_loader.load().await;
    let sink = S3Sink::new(Arc::new(s3_client(&sdk_config)));
    sink.log_buckets()
        .await
        .with_context(|| format!("Failed to list buckets at {}", endpoint_url))?;

    Ok(Arc::new(sink))
}

/// Create a lifecycle manager from `args` using `processor` for results
pub async fn build_manager(
    args: &AdapterArgs,
    processor: Arc<dyn ResultProcessor>,
) -> Result<LifecycleManager> {
    let sink = build_sink(args).await?;
    Ok(LifecycleManager::new(sink, processor).with_status_timeout(args.status_timeout))
}

/// Arguments for driving one run end to end
#[derive(Debug, Clone)]
pub struct PipelineArgs {
    pub adapter: AdapterArgs,
    pub input_path: String,
    pub output_path: String,
    pub base_path: Option<String>,
    /// Keep the result inline instead of writing it to `output_path`
    pub inline: bool,
}

/// Result of a completed pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    /// `results` response captured before the run was removed
    pub info: RunInfo,
    pub stats: LifecycleStats,
    pub duration: Duration,
}

/// Drive a single run through its whole lifecycle
///
/// The input artifact is read through the configured sink and submitted as the
/// raw result, so this doubles as a copy of a text artifact between storage
/// locations. Input that is not valid UTF-8 is refused.
pub async fn run_pipeline(args: PipelineArgs) -> Result<PipelineResult> {
    let start_time = Instant::now();

    let processor: Arc<dyn ResultProcessor> = if args.inline {
        Arc::new(InlineOnly)
    } else {
        Arc::new(Passthrough)
    };

    let (telemetry_tx, mut telemetry_rx) = mpsc::unbounded_channel::<LifecycleEvent>();
    let manager = build_manager(&args.adapter, processor)
        .await?
        .with_telemetry(telemetry_tx);

    let info = drive(&manager, &args).await?;

    // Dropping the manager drops the sender so the channel drains to completion
    drop(manager);
    let mut stats = LifecycleStats::new();
    while let Some(event) = telemetry_rx.recv().await {
        stats.update(&event);
    }

    Ok(PipelineResult {
        info,
        stats,
        duration: start_time.elapsed(),
    })
}

async fn drive(manager: &LifecycleManager, args: &PipelineArgs) -> Result<RunInfo> {
    let model_run_id = manager.request().await.model_run_id;

    let config = RunConfig {
        input_path_1: Some(args.input_path.clone()),
        input_path_2: None,
        output_path: Some(args.output_path.clone()),
        base_path: args.base_path.clone(),
    };

    ensure_progress(manager.initialize(&model_run_id, config).await)?;
    ensure_progress(manager.run(&model_run_id).await)?;
    let status = ensure_progress(manager.status(&model_run_id).await)?;
    if status.state != ModelState::Succeeded {
        bail!(
            "Model run {} has not finished (state {})",
            model_run_id,
            status.state
        );
    }

    let inputs = manager
        .load_run_inputs(&model_run_id)
        .await
        .with_context(|| format!("Failed to load input {}", args.input_path))?
        .unwrap_or_default();
    let raw_result = match inputs.into_iter().next() {
        Some(bytes) => String::from_utf8(bytes)
            .with_context(|| format!("Input {} is not valid UTF-8", args.input_path))?,
        None => String::new(),
    };

    manager
        .submit_result(&model_run_id, &raw_result)
        .await
        .with_context(|| format!("Failed to store result of run {}", model_run_id))?;

    let info = manager.results(&model_run_id).await;
    manager.remove(&model_run_id).await;

    Ok(info)
}

fn ensure_progress(step: RunInfo) -> Result<RunInfo> {
    if step.state == ModelState::Error || step.reason.is_some() {
        bail!(
            "Model run {} stopped in state {}: {}",
            step.model_run_id,
            step.state,
            step.reason.unwrap_or_default()
        );
    }
    Ok(step)
}

/// Read a single artifact through the backend selected by `args`
pub async fn fetch_artifact(args: &AdapterArgs, path: &str) -> Result<Vec<u8>> {
    let sink = build_sink(args).await?;
    sink.load(path)
        .await
        .with_context(|| format!("Failed to fetch {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_local_backend() {
        let args = AdapterArgsBuilder::default().build().unwrap();
        assert!(args.object_store_endpoint.is_none());
        assert!(args.endpoint_url().is_none());
        assert_eq!(args.region, DEFAULT_REGION);
        assert_eq!(args.status_timeout, STATUS_POLL_TIMEOUT);
        assert!(!args.secure);
    }

    #[test]
    fn test_endpoint_url_scheme_follows_secure_flag() {
        let args = AdapterArgsBuilder::default()
            .object_store_endpoint("localhost:9000")
            .build()
            .unwrap();
        assert_eq!(args.endpoint_url().as_deref(), Some("http://localhost:9000"));

        let args = AdapterArgsBuilder::default()
            .object_store_endpoint("minio.internal:9000")
            .secure(true)
            .build()
            .unwrap();
        assert_eq!(
            args.endpoint_url().as_deref(),
            Some("https://minio.internal:9000")
        );

        let args = AdapterArgsBuilder::default()
            .object_store_endpoint("http://127.0.0.1:9000")
            .build()
            .unwrap();
        assert_eq!(args.endpoint_url().as_deref(), Some("http://127.0.0.1:9000"));
    }

    #[tokio::test]
    async fn test_build_sink_rejects_half_credentials() {
        let args = AdapterArgsBuilder::default()
            .object_store_endpoint("http://127.0.0.1:9")
            .access_key("key")
            .build()
            .unwrap();

        let result = build_sink(&args).await;
        assert!(result.is_err());
    }
}
