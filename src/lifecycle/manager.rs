use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::probe::{CompletionProbe, ImmediateCompletion, JobStatus};
use super::processor::ResultProcessor;
use super::registry::RunRegistry;
use super::state::ModelState;
use super::types::{RunConfig, RunInfo, RunResult};
use crate::config::STATUS_POLL_TIMEOUT;
use crate::error::{AdapterError, Result};
use crate::io::{StorageSink, load_all};
use crate::telemetry::LifecycleEvent;

const NOT_READY: &str = "Model is not in READY state";
const NOT_CONFIGURED: &str = "Model has no configuration";
const RESULT_ALREADY_STORED: &str = "Model result already stored";

/// What a completion poll concluded
enum PollOutcome {
    Finished(JobStatus),
    Failed(String),
    TimedOut,
    Cancelled,
}

/// The LifecycleManager tracks model runs and persists their results.
///
/// Lookup failures and rejected transitions are answered with a `RunInfo`
/// carrying a reason; only storage and processing failures surface as `Err`.
pub struct LifecycleManager {
    registry: RunRegistry,
    sink: Arc<dyn StorageSink>,
    processor: Arc<dyn ResultProcessor>,
    probe: Arc<dyn CompletionProbe>,
    status_timeout: Duration,
    telemetry_tx: Option<mpsc::UnboundedSender<LifecycleEvent>>,
}

impl LifecycleManager {
    /// Create a new LifecycleManager writing through `sink`
    pub fn new(sink: Arc<dyn StorageSink>, processor: Arc<dyn ResultProcessor>) -> Self {
        info!("Lifecycle manager using {} storage", sink.backend());
        Self {
            registry: RunRegistry::new(),
            sink,
            processor,
            probe: Arc::new(ImmediateCompletion),
            status_timeout: STATUS_POLL_TIMEOUT,
            telemetry_tx: None,
        }
    }

    /// Replace the completion probe consulted by `status`
    pub fn with_probe(mut self, probe: Arc<dyn CompletionProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Bound each completion poll made by `status`
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Send lifecycle events to `telemetry_tx`
    pub fn with_telemetry(mut self, telemetry_tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        self.telemetry_tx = Some(telemetry_tx);
        self
    }

    fn emit(&self, event: LifecycleEvent) {
        if let Some(tx) = &self.telemetry_tx {
            let _ = tx.send(event);
        }
    }

    fn transitioned(&self, model_run_id: &str, from: ModelState, to: ModelState) {
        debug!("Run {}: {} -> {}", model_run_id, from, to);
        self.emit(LifecycleEvent::Transitioned {
            model_run_id: model_run_id.to_string(),
            from,
            to,
        });
    }

    /// Answer a refused operation without touching the registry
    fn reject(&self, model_run_id: &str, operation: &'static str, err: AdapterError) -> RunInfo {
        warn!("Run {}: {} refused: {}", model_run_id, operation, err);
        self.emit(LifecycleEvent::Rejected {
            model_run_id: model_run_id.to_string(),
            operation,
        });
        RunInfo::from_error(model_run_id, &err)
    }

    fn unknown(&self, model_run_id: &str, operation: &'static str) -> RunInfo {
        self.reject(
            model_run_id,
            operation,
            AdapterError::unknown_run(operation, model_run_id),
        )
    }

    /// Register a new run in the ACCEPTED state
    pub async fn request(&self) -> RunInfo {
        let model_run_id = self.registry.create(ModelState::Accepted).await;
        info!("Accepted model run {}", model_run_id);
        self.emit(LifecycleEvent::Requested {
            model_run_id: model_run_id.clone(),
        });
        RunInfo::new(model_run_id, ModelState::Accepted)
    }

    /// Attach configuration to a run and mark it READY
    ///
    /// The transition is applied from any state.
    pub async fn initialize(&self, model_run_id: &str, config: RunConfig) -> RunInfo {
        let from = self
            .registry
            .update(model_run_id, |record| {
                let from = record.state;
                record.config = Some(config);
                record.state = ModelState::Ready;
                from
            })
            .await;

        match from {
            Some(from) => {
                self.transitioned(model_run_id, from, ModelState::Ready);
                RunInfo::new(model_run_id, ModelState::Ready)
            }
            None => self.unknown(model_run_id, "initialize"),
        }
    }

    /// Start a READY run
    pub async fn run(&self, model_run_id: &str) -> RunInfo {
        let outcome = self
            .registry
            .update(model_run_id, |record| {
                if !record.state.can_start() {
                    return Err(AdapterError::IllegalTransition {
                        state: record.state,
                        reason: NOT_READY,
                    });
                }
                if record.config.is_none() {
                    return Err(AdapterError::IllegalTransition {
                        state: record.state,
                        reason: NOT_CONFIGURED,
                    });
                }
                let from = record.state;
                record.state = ModelState::Running;
                record.cancel = Some(CancellationToken::new());
                Ok(from)
            })
            .await;

        match outcome {
            Some(Ok(from)) => {
                info!("Started model run {}", model_run_id);
                self.transitioned(model_run_id, from, ModelState::Running);
                RunInfo::new(model_run_id, ModelState::Running)
            }
            Some(Err(err)) => self.reject(model_run_id, "run", err),
            None => self.unknown(model_run_id, "run"),
        }
    }

    /// Poll the job collaborator and fold its answer into the run's state
    pub async fn status(&self, model_run_id: &str) -> RunInfo {
        let Some(cancel) = self
            .registry
            .update(model_run_id, |record| record.cancel.clone())
            .await
        else {
            return self.unknown(model_run_id, "status");
        };
        // Runs that were never started still get a token so the probe signature stays uniform
        let cancel = cancel.unwrap_or_else(CancellationToken::new);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => PollOutcome::Cancelled,
            polled = tokio::time::timeout(self.status_timeout, self.probe.poll(model_run_id, &cancel)) => {
                match polled {
                    Ok(Ok(status)) => PollOutcome::Finished(status),
                    Ok(Err(e)) => PollOutcome::Failed(format!("{:#}", e)),
                    Err(_) => PollOutcome::TimedOut,
                }
            }
        };

        let applied = self
            .registry
            .update(model_run_id, |record| {
                let from = record.state;
                let reason = match &outcome {
                    PollOutcome::Finished(JobStatus::Completed) => {
                        record.state = ModelState::Succeeded;
                        None
                    }
                    PollOutcome::Finished(JobStatus::Running) => None,
                    PollOutcome::Finished(JobStatus::Failed(reason)) => {
                        record.state = ModelState::Error;
                        Some(reason.clone())
                    }
                    PollOutcome::Failed(message) => {
                        Some(format!("Error in status(): poll failed: {}", message))
                    }
                    PollOutcome::TimedOut => Some(format!(
                        "Error in status(): poll timed out after {:?}",
                        self.status_timeout
                    )),
                    PollOutcome::Cancelled => Some("Error in status(): poll cancelled".to_string()),
                };
                (from, record.state, reason)
            })
            .await;

        match applied {
            Some((from, to, reason)) => {
                if from != to {
                    self.transitioned(model_run_id, from, to);
                }
                let info = RunInfo::new(model_run_id, to);
                match reason {
                    Some(reason) => info.with_reason(reason),
                    None => info,
                }
            }
            None => self.unknown(model_run_id, "status"),
        }
    }

    /// Record a raw result, writing the processed artifact when there is one
    ///
    /// Returns `Err` when the artifact cannot be written; the run is then left
    /// exactly as it was.
    pub async fn submit_result(&self, model_run_id: &str, raw_result: &str) -> Result<RunInfo> {
        const OPERATION: &str = "submit_result";

        // The slot is reserved under the same lock that checks it, so concurrent
        // submissions cannot both pass.
        let snapshot = self
            .registry
            .update(model_run_id, |record| {
                if record.result.is_some() || record.submitting {
                    return Err(AdapterError::IllegalTransition {
                        state: record.state,
                        reason: RESULT_ALREADY_STORED,
                    });
                }
                record.submitting = true;
                Ok(record
                    .config
                    .as_ref()
                    .and_then(|config| config.output_path.clone()))
            })
            .await;

        let output_path = match snapshot {
            Some(Ok(output_path)) => output_path,
            Some(Err(err)) => return Ok(self.reject(model_run_id, OPERATION, err)),
            None => return Ok(self.unknown(model_run_id, OPERATION)),
        };

        let (result, bytes_stored) = match self
            .persist_result(model_run_id, raw_result, output_path)
            .await
        {
            Ok(persisted) => persisted,
            Err(e) => {
                self.registry
                    .update(model_run_id, |record| record.submitting = false)
                    .await;
                return Err(e);
            }
        };
        let inline = matches!(result, RunResult::Inline { .. });

        let from = self
            .registry
            .update(model_run_id, |record| {
                let from = record.state;
                record.submitting = false;
                record.result = Some(result);
                record.state = ModelState::Succeeded;
                from
            })
            .await;

        let Some(from) = from else {
            return Ok(self.unknown(model_run_id, OPERATION));
        };

        self.emit(LifecycleEvent::ResultRecorded {
            model_run_id: model_run_id.to_string(),
            bytes_stored,
            inline,
        });
        if from != ModelState::Succeeded {
            self.transitioned(model_run_id, from, ModelState::Succeeded);
        }
        Ok(RunInfo::new(model_run_id, ModelState::Succeeded))
    }

    /// Run the processor and write its artifact, if any
    async fn persist_result(
        &self,
        model_run_id: &str,
        raw_result: &str,
        output_path: Option<String>,
    ) -> Result<(RunResult, u64)> {
        let artifact = self
            .processor
            .process(raw_result)
            .await
            .map_err(|e| AdapterError::Processing(e.into()))?;

        match artifact.filter(|artifact| !artifact.is_empty()) {
            Some(artifact) => {
                let path = output_path.ok_or_else(|| AdapterError::MissingOutputPath {
                    model_run_id: model_run_id.to_string(),
                })?;
                let content = Bytes::from(artifact);
                let len = content.len() as u64;
                self.sink.store(&path, content).await?;
                info!("Stored result of run {} at {}", model_run_id, path);
                Ok((RunResult::Stored { path }, len))
            }
            None => Ok((
                RunResult::Inline {
                    result: raw_result.to_string(),
                },
                0,
            )),
        }
    }

    /// Current state and result of a run
    pub async fn results(&self, model_run_id: &str) -> RunInfo {
        match self
            .registry
            .update(model_run_id, |record| record.info())
            .await
        {
            Some(info) => info,
            None => self.unknown(model_run_id, "results"),
        }
    }

    /// Forget a run and admit one pending run into the freed slot
    pub async fn remove(&self, model_run_id: &str) -> RunInfo {
        let Some(removal) = self.registry.remove(model_run_id).await else {
            return self.unknown(model_run_id, "remove");
        };

        info!(
            "Removed model run {} (was {})",
            model_run_id, removal.record.state
        );
        if let Some(admitted) = &removal.admitted {
            info!("Admitted pending model run {}", admitted);
            self.transitioned(admitted, ModelState::Pending, ModelState::Accepted);
        }
        self.emit(LifecycleEvent::Removed {
            model_run_id: model_run_id.to_string(),
            admitted: removal.admitted,
        });

        RunInfo::new(model_run_id, ModelState::Unknown)
    }

    /// Read an input artifact through the storage sink
    pub async fn load_input(&self, path: &str) -> Result<Vec<u8>> {
        debug!("Loading input {} from {} storage", path, self.sink.backend());
        self.sink.load(path).await
    }

    /// Read the configured inputs of a run, in order
    ///
    /// Returns `None` for an unknown id and an empty list for an uninitialized run.
    pub async fn load_run_inputs(&self, model_run_id: &str) -> Result<Option<Vec<Vec<u8>>>> {
        let Some(paths) = self
            .registry
            .update(model_run_id, |record| {
                record
                    .config
                    .as_ref()
                    .map(|config| {
                        config
                            .input_paths()
                            .into_iter()
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .await
        else {
            return Ok(None);
        };

        let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
        load_all(self.sink.as_ref(), &paths).await.map(Some)
    }

    /// Number of tracked runs
    pub async fn run_count(&self) -> usize {
        self.registry.len().await
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &RunRegistry {
        &self.registry
    }
}
