use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::state::ModelState;
use crate::error::AdapterError;

/// Per-run configuration supplied by `initialize`
///
/// Field names follow the generic form; the ESDL-specific names used by the
/// map editor front-end are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(
        default,
        alias = "input_esdl_file_path_1",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_path_1: Option<String>,
    #[serde(
        default,
        alias = "input_esdl_file_path_2",
        skip_serializing_if = "Option::is_none"
    )]
    pub input_path_2: Option<String>,
    /// Target for the processed artifact (`file://...` or `<bucket>/<key>`)
    #[serde(
        default,
        alias = "output_esdl_file_path",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

impl RunConfig {
    /// Configured input paths, in order
    pub fn input_paths(&self) -> Vec<&str> {
        [&self.input_path_1, &self.input_path_2]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// Outcome recorded by result submission
///
/// Serialized untagged, so the JSON shape is `{"path": ...}` or `{"result": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunResult {
    /// Processed artifact was written through the storage sink
    Stored { path: String },
    /// Processor declined to produce an artifact; raw result kept inline
    Inline { result: String },
}

/// Projection of a run returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub model_run_id: String,
    pub state: ModelState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RunInfo {
    pub fn new(model_run_id: impl Into<String>, state: ModelState) -> Self {
        Self {
            model_run_id: model_run_id.into(),
            state,
            result: None,
            reason: None,
        }
    }

    pub fn with_result(mut self, result: Option<RunResult>) -> Self {
        self.result = result;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Fold a recoverable lifecycle error into a caller-facing response
    ///
    /// Unknown ids report `ERROR`; rejected transitions keep the run's current state.
    pub(crate) fn from_error(model_run_id: &str, err: &AdapterError) -> Self {
        let state = match err {
            AdapterError::IllegalTransition { state, .. } => *state,
            _ => ModelState::Error,
        };
        Self::new(model_run_id, state).with_reason(err.to_string())
    }
}

/// A tracked run, owned by the registry
#[derive(Debug)]
pub(crate) struct RunRecord {
    pub id: String,
    pub state: ModelState,
    pub config: Option<RunConfig>,
    pub result: Option<RunResult>,
    /// Set while a submission is writing its artifact
    pub submitting: bool,
    /// Created when the run starts; cancelled when the record is removed
    pub cancel: Option<CancellationToken>,
}

impl RunRecord {
    pub fn new(id: String, state: ModelState) -> Self {
        Self {
            id,
            state,
            config: None,
            result: None,
            submitting: false,
            cancel: None,
        }
    }

    pub fn info(&self) -> RunInfo {
        RunInfo::new(self.id.clone(), self.state).with_result(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_accepts_esdl_field_names() {
        let json = r#"{
            "input_esdl_file_path_1": "bucket/in.esdl",
            "output_esdl_file_path": "file:///tmp/out.esdl",
            "base_path": "bucket"
        }"#;

        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.input_path_1.as_deref(), Some("bucket/in.esdl"));
        assert_eq!(config.input_path_2, None);
        assert_eq!(config.output_path.as_deref(), Some("file:///tmp/out.esdl"));
        assert_eq!(config.input_paths(), vec!["bucket/in.esdl"]);
    }

    #[test]
    fn test_result_serializes_as_plain_mapping() {
        let stored = RunResult::Stored {
            path: "file:///tmp/out.esdl".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            serde_json::json!({"path": "file:///tmp/out.esdl"})
        );

        let inline = RunResult::Inline {
            result: "42".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&inline).unwrap(),
            serde_json::json!({"result": "42"})
        );
    }

    #[test]
    fn test_info_omits_empty_fields() {
        let info = RunInfo::new("r1", ModelState::Accepted);
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            serde_json::json!({"model_run_id": "r1", "state": "ACCEPTED"})
        );
    }

    #[test]
    fn test_from_error_keeps_state_for_rejected_transition() {
        let err = AdapterError::IllegalTransition {
            state: ModelState::Accepted,
            reason: "Model is not in READY state",
        };
        let info = RunInfo::from_error("r1", &err);
        assert_eq!(info.state, ModelState::Accepted);
        assert_eq!(
            info.reason.as_deref(),
            Some("Error: Model is not in READY state")
        );

        let err = AdapterError::unknown_run("status", "r1");
        let info = RunInfo::from_error("r1", &err);
        assert_eq!(info.state, ModelState::Error);
        assert!(info.reason.unwrap().contains("model_run_id unknown"));
    }
}
