//! Error taxonomy for lifecycle and storage operations

use thiserror::Error;

use crate::lifecycle::ModelState;

/// Boxed source error from a storage backend or processor
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the lifecycle manager and the storage sinks
///
/// `UnknownRun` and `IllegalTransition` are recovered into a `RunInfo` by the
/// lifecycle manager and never leave it as `Err`. Every other variant is fatal
/// for the operation that raised it.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Error in {operation}(): model_run_id unknown")]
    UnknownRun {
        operation: &'static str,
        model_run_id: String,
    },

    #[error("Error: {reason}")]
    IllegalTransition {
        state: ModelState,
        reason: &'static str,
    },

    #[error("Don't know how to handle path {path}: unsupported scheme for the {backend} backend")]
    UnsupportedPathScheme { path: String, backend: &'static str },

    #[error("Invalid artifact path {path}: {message}")]
    InvalidPath { path: String, message: &'static str },

    #[error("Run {model_run_id} has no output path configured")]
    MissingOutputPath { model_run_id: String },

    #[error("Failed to retrieve {path}")]
    Retrieval {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to {action} {path}")]
    Storage {
        action: &'static str,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Result processing failed")]
    Processing(#[source] BoxError),
}

impl AdapterError {
    pub(crate) fn unknown_run(operation: &'static str, model_run_id: &str) -> Self {
        Self::UnknownRun {
            operation,
            model_run_id: model_run_id.to_string(),
        }
    }

    pub(crate) fn retrieval(path: &str, source: impl Into<BoxError>) -> Self {
        Self::Retrieval {
            path: path.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn storage(action: &'static str, path: &str, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            action,
            path: path.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T, E = AdapterError> = std::result::Result<T, E>;
