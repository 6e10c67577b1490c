// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion notification payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JobCompleted,
    JobFailed,
}

crate::simple_display! {
    NotificationKind {
        JobCompleted => "job_completed",
        JobFailed => "job_failed",
    }
}

/// Fired exactly once per terminal job (completed or failed; cancelled
/// jobs notify nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub job_id: String,
    pub title: String,
    pub body: String,
}
