use crate::lifecycle::ModelState;

/// Telemetry events sent from the lifecycle manager for run tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A new run was registered
    Requested { model_run_id: String },
    /// A run changed state
    Transitioned {
        model_run_id: String,
        from: ModelState,
        to: ModelState,
    },
    /// A result was recorded, either written to storage or kept inline
    ResultRecorded {
        model_run_id: String,
        bytes_stored: u64,
        inline: bool,
    },
    /// An operation was refused (unknown id or illegal transition)
    Rejected {
        model_run_id: String,
        operation: &'static str,
    },
    /// A run was removed, possibly admitting a pending run
    Removed {
        model_run_id: String,
        admitted: Option<String>,
    },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LifecycleStats {
    pub runs_requested: usize,
    pub runs_started: usize,
    pub runs_succeeded: usize,
    pub runs_failed: usize,
    pub runs_removed: usize,
    pub runs_admitted: usize,
    pub results_stored: usize,
    pub results_inline: usize,
    pub bytes_stored: u64,
    pub rejected_operations: usize,
}

impl LifecycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Requested { .. } => {
                self.runs_requested += 1;
            }
            LifecycleEvent::Transitioned { from, to, .. } => {
                // Re-polling a finished run reports a self-transition; count it once
                if from == to {
                    return;
                }
                match to {
                    ModelState::Running => self.runs_started += 1,
                    ModelState::Succeeded => self.runs_succeeded += 1,
                    ModelState::Error => self.runs_failed += 1,
                    ModelState::Unknown
                    | ModelState::Pending
                    | ModelState::Accepted
                    | ModelState::Queued
                    | ModelState::Ready => {}
                }
            }
            LifecycleEvent::ResultRecorded {
                bytes_stored,
                inline,
                ..
            } => {
                if *inline {
                    self.results_inline += 1;
                } else {
                    self.results_stored += 1;
                    self.bytes_stored += bytes_stored;
                }
            }
            LifecycleEvent::Rejected { .. } => {
                self.rejected_operations += 1;
            }
            LifecycleEvent::Removed { admitted, .. } => {
                self.runs_removed += 1;
                if admitted.is_some() {
                    self.runs_admitted += 1;
                }
            }
        }
    }

    /// Aggregate every event in `events`
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a LifecycleEvent>) -> Self {
        let mut stats = Self::new();
        for event in events {
            stats.update(event);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: ModelState, to: ModelState) -> LifecycleEvent {
        LifecycleEvent::Transitioned {
            model_run_id: "r1".to_string(),
            from,
            to,
        }
    }

    #[test]
    fn test_stats_count_lifecycle() {
        let events = vec![
            LifecycleEvent::Requested {
                model_run_id: "r1".to_string(),
            },
            transition(ModelState::Accepted, ModelState::Ready),
            transition(ModelState::Ready, ModelState::Running),
            transition(ModelState::Running, ModelState::Succeeded),
            transition(ModelState::Succeeded, ModelState::Succeeded),
            LifecycleEvent::ResultRecorded {
                model_run_id: "r1".to_string(),
                bytes_stored: 6,
                inline: false,
            },
            LifecycleEvent::Removed {
                model_run_id: "r1".to_string(),
                admitted: Some("r2".to_string()),
            },
        ];

        let stats = LifecycleStats::from_events(&events);
        assert_eq!(stats.runs_requested, 1);
        assert_eq!(stats.runs_started, 1);
        assert_eq!(stats.runs_succeeded, 1);
        assert_eq!(stats.results_stored, 1);
        assert_eq!(stats.bytes_stored, 6);
        assert_eq!(stats.runs_removed, 1);
        assert_eq!(stats.runs_admitted, 1);
    }

    #[test]
    fn test_inline_results_do_not_count_bytes() {
        let mut stats = LifecycleStats::new();
        stats.update(&LifecycleEvent::ResultRecorded {
            model_run_id: "r1".to_string(),
            bytes_stored: 0,
            inline: true,
        });
        stats.update(&LifecycleEvent::Rejected {
            model_run_id: "missing".to_string(),
            operation: "run",
        });

        assert_eq!(stats.results_inline, 1);
        assert_eq!(stats.results_stored, 0);
        assert_eq!(stats.bytes_stored, 0);
        assert_eq!(stats.rejected_operations, 1);
    }
}
