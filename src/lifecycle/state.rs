use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a model run
///
/// `Pending` and `Queued` are not produced by any lifecycle operation. They are
/// kept for callers that park runs before admission; `Pending` runs are admitted
/// when another run is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelState {
    #[default]
    Unknown,
    Pending,
    Accepted,
    Queued,
    Ready,
    Running,
    Succeeded,
    Error,
}

impl ModelState {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelState::Unknown => "UNKNOWN",
            ModelState::Pending => "PENDING",
            ModelState::Accepted => "ACCEPTED",
            ModelState::Queued => "QUEUED",
            ModelState::Ready => "READY",
            ModelState::Running => "RUNNING",
            ModelState::Succeeded => "SUCCEEDED",
            ModelState::Error => "ERROR",
        }
    }

    /// Whether `run` may move this state to `Running`
    pub fn can_start(self) -> bool {
        match self {
            ModelState::Ready => true,
            ModelState::Unknown
            | ModelState::Pending
            | ModelState::Accepted
            | ModelState::Queued
            | ModelState::Running
            | ModelState::Succeeded
            | ModelState::Error => false,
        }
    }

    /// State a run moves to when an admission slot frees up, if it is waiting for one
    pub fn admitted(self) -> Option<ModelState> {
        match self {
            ModelState::Pending => Some(ModelState::Accepted),
            ModelState::Unknown
            | ModelState::Accepted
            | ModelState::Queued
            | ModelState::Ready
            | ModelState::Running
            | ModelState::Succeeded
            | ModelState::Error => None,
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
