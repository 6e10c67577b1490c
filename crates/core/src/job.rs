// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
///
/// Transitions only move forward: `queued → running → {completed |
/// failed | cancelled}`, plus the `queued → cancelled` shortcut for
/// jobs cancelled before their subprocess starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    /// Parse the persisted string form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check whether the state machine permits moving to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }
}

/// One delegated-prompt execution unit.
///
/// Rows are owned by a conversation and deleted with it. The engine is
/// the only writer; the runner and parser never touch job rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub conversation_id: String,
    pub prompt: String,
    pub status: JobStatus,
    /// Origin tag, e.g. "web" or "mcp".
    pub source: String,
    /// Final accumulated text. Set only on `completed`.
    pub result: Option<String>,
    /// Failure message. Set only on `failed`.
    pub error: Option<String>,
    /// OS process id. Non-null only while `running`.
    pub pid: Option<u32>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// Set exactly once, at the `running` transition.
    pub started_at_ms: Option<u64>,
    /// Set exactly once, at any terminal transition.
    pub completed_at_ms: Option<u64>,
}

impl Job {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct JobBuilder {
    id: String,
    conversation_id: String,
    prompt: String,
    status: JobStatus,
    source: String,
    result: Option<String>,
    error: Option<String>,
    pid: Option<u32>,
    created_at_ms: u64,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            id: "job-test1".into(),
            conversation_id: "conv-test1".into(),
            prompt: "do the thing".into(),
            status: JobStatus::Queued,
            source: "web".into(),
            result: None,
            error: None,
            pid: None,
            created_at_ms: 1_000_000,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.id = v.into();
        self
    }

    pub fn conversation_id(mut self, v: impl Into<String>) -> Self {
        self.conversation_id = v.into();
        self
    }

    pub fn prompt(mut self, v: impl Into<String>) -> Self {
        self.prompt = v.into();
        self
    }

    pub fn status(mut self, v: JobStatus) -> Self {
        self.status = v;
        self
    }

    pub fn source(mut self, v: impl Into<String>) -> Self {
        self.source = v.into();
        self
    }

    pub fn result(mut self, v: impl Into<String>) -> Self {
        self.result = Some(v.into());
        self
    }

    pub fn error(mut self, v: impl Into<String>) -> Self {
        self.error = Some(v.into());
        self
    }

    pub fn pid(mut self, v: u32) -> Self {
        self.pid = Some(v);
        self
    }

    pub fn build(self) -> Job {
        Job {
            id: self.id,
            conversation_id: self.conversation_id,
            prompt: self.prompt,
            status: self.status,
            source: self.source,
            result: self.result,
            error: self.error,
            pid: self.pid,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.created_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Job {
    /// Create a builder with test defaults.
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
