//! In-memory run registry
//!
//! Single source of truth for run state. All access goes through one async
//! mutex, and callers only ever see the map inside a synchronous closure, so
//! the lock is never held across storage or probe I/O.

use indexmap::IndexMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::state::ModelState;
use super::types::RunRecord;

/// Outcome of removing a run
#[derive(Debug)]
pub(crate) struct Removal {
    pub record: RunRecord,
    /// Id of the pending run admitted into the freed slot, if any
    pub admitted: Option<String>,
}

/// Registry of tracked runs, in insertion order
#[derive(Default)]
pub(crate) struct RunRegistry {
    runs: Mutex<IndexMap<String, RunRecord>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run in `state` under a freshly generated id
    pub async fn create(&self, state: ModelState) -> String {
        let mut runs = self.runs.lock().await;
        let mut id = Uuid::new_v4().to_string();
        while runs.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        runs.insert(id.clone(), RunRecord::new(id.clone(), state));
        id
    }

    /// Run `f` against the record for `id`; `None` if the id is unknown
    pub async fn update<T>(&self, id: &str, f: impl FnOnce(&mut RunRecord) -> T) -> Option<T> {
        let mut runs = self.runs.lock().await;
        runs.get_mut(id).map(f)
    }

    /// Remove the record for `id` and admit the earliest pending run, if any
    ///
    /// At most one run is admitted per removal.
    pub async fn remove(&self, id: &str) -> Option<Removal> {
        let mut runs = self.runs.lock().await;
        let record = runs.shift_remove(id)?;

        if let Some(token) = &record.cancel {
            token.cancel();
        }

        let admitted = runs.values_mut().find_map(|candidate| {
            candidate.state.admitted().map(|next| {
                candidate.state = next;
                candidate.id.clone()
            })
        });

        Some(Removal { record, admitted })
    }

    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }

    /// Snapshot of `(id, state)` pairs in insertion order
    #[cfg(test)]
    pub async fn states(&self) -> Vec<(String, ModelState)> {
        self.runs
            .lock()
            .await
            .values()
            .map(|record| (record.id.clone(), record.state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_create_assigns_distinct_ids() {
        let registry = RunRegistry::new();
        let mut ids = HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(registry.create(ModelState::Accepted).await));
        }
        assert_eq!(registry.len().await, 100);
    }

    #[tokio::test]
    async fn test_update_unknown_id_returns_none() {
        let registry = RunRegistry::new();
        let touched = registry
            .update("missing", |record| record.state = ModelState::Ready)
            .await;
        assert!(touched.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_remove_admits_earliest_pending_only() {
        let registry = RunRegistry::new();
        let victim = registry.create(ModelState::Running).await;
        let first = registry.create(ModelState::Pending).await;
        let second = registry.create(ModelState::Pending).await;

        let removal = registry.remove(&victim).await.unwrap();
        assert_eq!(removal.admitted.as_deref(), Some(first.as_str()));

        let states = registry.states().await;
        assert_eq!(
            states,
            vec![
                (first, ModelState::Accepted),
                (second, ModelState::Pending)
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_without_pending_leaves_others_untouched() {
        let registry = RunRegistry::new();
        let victim = registry.create(ModelState::Accepted).await;
        let other = registry.create(ModelState::Queued).await;

        let removal = registry.remove(&victim).await.unwrap();
        assert!(removal.admitted.is_none());
        assert_eq!(registry.states().await, vec![(other, ModelState::Queued)]);
    }

    #[tokio::test]
    async fn test_remove_cancels_run_token() {
        let registry = RunRegistry::new();
        let id = registry.create(ModelState::Ready).await;
        let token = tokio_util::sync::CancellationToken::new();
        registry
            .update(&id, |record| record.cancel = Some(token.clone()))
            .await;

        registry.remove(&id).await.unwrap();
        assert!(token.is_cancelled());
        assert!(registry.remove(&id).await.is_none());
    }
}
