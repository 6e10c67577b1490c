// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence seam for the orchestrator.
//!
//! The orchestrator talks to storage through this trait so tests can
//! inject write failures; [`relay_storage::Store`] is the production
//! impl.

use relay_core::{Job, JobEventPayload, JobStatus};
use relay_storage::{Store, StoreError, StoredEvent};

pub trait JobStore: Send + Sync + 'static {
    fn create_job(
        &self,
        conversation_id: &str,
        prompt: &str,
        source: &str,
    ) -> Result<Job, StoreError>;
    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError>;
    fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError>;
    fn mark_running(&self, id: &str, pid: Option<u32>) -> Result<Job, StoreError>;
    fn mark_completed(&self, id: &str, result: &str) -> Result<Job, StoreError>;
    fn mark_failed(&self, id: &str, error: &str) -> Result<Job, StoreError>;
    fn mark_cancelled(&self, id: &str) -> Result<Job, StoreError>;
    fn append_event(
        &self,
        job_id: &str,
        payload: &JobEventPayload,
    ) -> Result<StoredEvent, StoreError>;
    fn events_after(&self, job_id: &str, after_seq: i64) -> Result<Vec<StoredEvent>, StoreError>;
}

impl JobStore for Store {
    fn create_job(
        &self,
        conversation_id: &str,
        prompt: &str,
        source: &str,
    ) -> Result<Job, StoreError> {
        Store::create_job(self, conversation_id, prompt, source)
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Store::get_job(self, id)
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError> {
        Store::list_jobs(self, status)
    }

    fn mark_running(&self, id: &str, pid: Option<u32>) -> Result<Job, StoreError> {
        Store::mark_running(self, id, pid)
    }

    fn mark_completed(&self, id: &str, result: &str) -> Result<Job, StoreError> {
        Store::mark_completed(self, id, result)
    }

    fn mark_failed(&self, id: &str, error: &str) -> Result<Job, StoreError> {
        Store::mark_failed(self, id, error)
    }

    fn mark_cancelled(&self, id: &str) -> Result<Job, StoreError> {
        Store::mark_cancelled(self, id)
    }

    fn append_event(
        &self,
        job_id: &str,
        payload: &JobEventPayload,
    ) -> Result<StoredEvent, StoreError> {
        Store::append_event(self, job_id, payload)
    }

    fn events_after(&self, job_id: &str, after_seq: i64) -> Result<Vec<StoredEvent>, StoreError> {
        Store::events_after(self, job_id, after_seq)
    }
}

/// Wraps a real store and fails event appends on cue, for exercising
/// the write-failure-aborts-job path.
#[cfg(any(test, feature = "test-support"))]
pub struct FlakyStore {
    inner: std::sync::Arc<Store>,
    /// `Some(n)`: let `n` more appends through, then fail every one.
    remaining_appends: parking_lot::Mutex<Option<u32>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FlakyStore {
    pub fn new(inner: std::sync::Arc<Store>) -> Self {
        Self { inner, remaining_appends: parking_lot::Mutex::new(None) }
    }

    /// Let the first `n` appends succeed and fail the rest.
    pub fn fail_appends_after(&self, n: u32) {
        *self.remaining_appends.lock() = Some(n);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl JobStore for FlakyStore {
    fn create_job(
        &self,
        conversation_id: &str,
        prompt: &str,
        source: &str,
    ) -> Result<Job, StoreError> {
        self.inner.create_job(conversation_id, prompt, source)
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.inner.get_job(id)
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError> {
        self.inner.list_jobs(status)
    }

    fn mark_running(&self, id: &str, pid: Option<u32>) -> Result<Job, StoreError> {
        self.inner.mark_running(id, pid)
    }

    fn mark_completed(&self, id: &str, result: &str) -> Result<Job, StoreError> {
        self.inner.mark_completed(id, result)
    }

    fn mark_failed(&self, id: &str, error: &str) -> Result<Job, StoreError> {
        self.inner.mark_failed(id, error)
    }

    fn mark_cancelled(&self, id: &str) -> Result<Job, StoreError> {
        self.inner.mark_cancelled(id)
    }

    fn append_event(
        &self,
        job_id: &str,
        payload: &JobEventPayload,
    ) -> Result<StoredEvent, StoreError> {
        {
            let mut remaining = self.remaining_appends.lock();
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    return Err(StoreError::Corrupt("simulated write failure".to_string()));
                }
                *left -= 1;
            }
        }
        self.inner.append_event(job_id, payload)
    }

    fn events_after(&self, job_id: &str, after_seq: i64) -> Result<Vec<StoredEvent>, StoreError> {
        self.inner.events_after(job_id, after_seq)
    }
}
