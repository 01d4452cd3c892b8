//! Ingestion run bookkeeping.
//!
//! At most one ingestion runs at a time. [`IngestionTaskManager::start`]
//! hands out an [`IngestionTask`] guard; dropping the guard (success, error
//! or cancellation alike) resets the state. A second start while one is
//! running is rejected, not queued.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionState {
    pub running: bool,
    pub task_id: Option<String>,
    pub cancel_requested: bool,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct IngestionTaskManager {
    state: Mutex<IngestionState>,
}

impl IngestionTaskManager {
    pub fn new() -> Self { Self::default() }

    /// Starts a run with a timestamped id (`ingest-YYYY-MM-DD-HHMMSS`).
    pub fn start(&self) -> Result<IngestionTask<'_>> {
        let task_id = format!("ingest-{}", Utc::now().format("%Y-%m-%d-%H%M%S"));
        self.start_with_id(task_id)
    }

    pub fn start_with_id(&self, task_id: impl Into<String>) -> Result<IngestionTask<'_>> {
        let task_id = task_id.into();
        let mut state = self.lock();
        if state.running {
            let running = state.task_id.clone().unwrap_or_default();
            tracing::warn!(rejected = %task_id, running = %running, "ingestion already in progress");
            return Err(Error::IngestionInProgress { task_id: running });
        }
        *state = IngestionState {
            running: true,
            task_id: Some(task_id.clone()),
            cancel_requested: false,
            started_at: Some(Utc::now()),
        };
        tracing::info!(task_id = %task_id, "ingestion started");
        Ok(IngestionTask { manager: self, task_id })
    }

    /// Flags the running task for cancellation. Returns `false` when idle.
    pub fn request_cancel(&self) -> bool {
        let mut state = self.lock();
        if !state.running {
            return false;
        }
        state.cancel_requested = true;
        tracing::info!(task_id = ?state.task_id, "ingestion cancel requested");
        true
    }

    pub fn snapshot(&self) -> IngestionState { self.lock().clone() }

    fn reset(&self, task_id: &str) {
        let mut state = self.lock();
        if state.task_id.as_deref() == Some(task_id) {
            *state = IngestionState::default();
        }
    }

    fn lock(&self) -> MutexGuard<'_, IngestionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard for one running ingestion. The state resets when it is dropped.
#[derive(Debug)]
pub struct IngestionTask<'a> {
    manager: &'a IngestionTaskManager,
    task_id: String,
}

impl IngestionTask<'_> {
    pub fn id(&self) -> &str { &self.task_id }

    pub fn is_cancel_requested(&self) -> bool {
        let state = self.manager.lock();
        state.task_id.as_deref() == Some(self.task_id.as_str()) && state.cancel_requested
    }

    /// Errors with [`Error::IngestionCancelled`] once a cancel was requested.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancel_requested() {
            return Err(Error::IngestionCancelled { task_id: self.task_id.clone() });
        }
        Ok(())
    }
}

impl Drop for IngestionTask<'_> {
    fn drop(&mut self) {
        self.manager.reset(&self.task_id);
        tracing::info!(task_id = %self.task_id, "ingestion finished");
    }
}
