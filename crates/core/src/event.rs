// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the Relay job engine.
//!
//! A job's history is an append-only log of [`JobEventPayload`]s.
//! Activity events are the normalized view of a tool invocation's
//! lifecycle inside one agent run.

use serde::{Deserialize, Serialize};

/// What an activity event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ToolStart,
    ToolInput,
    ToolEnd,
    AllComplete,
}

crate::simple_display! {
    ActivityKind {
        ToolStart => "tool_start",
        ToolInput => "tool_input",
        ToolEnd => "tool_end",
        AllComplete => "all_complete",
    }
}

/// Outcome attached to `tool_end` and `all_complete` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Running,
    Complete,
    Error,
}

/// Normalized representation of a tool invocation's lifecycle, or the
/// whole-run completion signal.
///
/// Every `tool_input`/`tool_end` shares its correlation `id` with a
/// preceding `tool_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    /// Tool name. Present for tool_start and tool_end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Opaque tool-invocation correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable single-line input summary (file path, shell
    /// command, search pattern).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ActivityStatus>,
    /// Bounded output preview. Present for tool_end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ActivityEvent {
    pub fn tool_start(
        tool: impl Into<String>,
        id: impl Into<String>,
        input: Option<String>,
    ) -> Self {
        Self {
            kind: ActivityKind::ToolStart,
            tool: Some(tool.into()),
            id: Some(id.into()),
            input,
            status: None,
            output: None,
        }
    }

    pub fn tool_input(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::ToolInput,
            tool: None,
            id: Some(id.into()),
            input: Some(input.into()),
            status: None,
            output: None,
        }
    }

    pub fn tool_end(
        tool: impl Into<String>,
        id: impl Into<String>,
        is_error: bool,
        output: Option<String>,
    ) -> Self {
        Self {
            kind: ActivityKind::ToolEnd,
            tool: Some(tool.into()),
            id: Some(id.into()),
            input: None,
            status: Some(if is_error { ActivityStatus::Error } else { ActivityStatus::Complete }),
            output,
        }
    }

    pub fn all_complete(is_error: bool) -> Self {
        Self {
            kind: ActivityKind::AllComplete,
            tool: None,
            id: None,
            input: None,
            status: Some(if is_error { ActivityStatus::Error } else { ActivityStatus::Complete }),
            output: None,
        }
    }
}

/// Persisted event category, one per `job_events` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Activity,
    Text,
    Error,
    StatusChange,
}

crate::simple_display! {
    JobEventKind {
        Activity => "activity",
        Text => "text",
        Error => "error",
        StatusChange => "status_change",
    }
}

impl JobEventKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "activity" => Some(Self::Activity),
            "text" => Some(Self::Text),
            "error" => Some(Self::Error),
            "status_change" => Some(Self::StatusChange),
            _ => None,
        }
    }
}

/// Payload stored in a `job_events` row, shape keyed by [`JobEventKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventPayload {
    Activity(ActivityEvent),
    Text { text: String },
    Error { message: String },
    StatusChange { status: crate::job::JobStatus },
}

impl JobEventPayload {
    pub fn kind(&self) -> JobEventKind {
        match self {
            Self::Activity(_) => JobEventKind::Activity,
            Self::Text { .. } => JobEventKind::Text,
            Self::Error { .. } => JobEventKind::Error,
            Self::StatusChange { .. } => JobEventKind::StatusChange,
        }
    }

    /// Serialize the payload body (the `data` column).
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::Activity(activity) => {
                serde_json::to_value(activity).unwrap_or(serde_json::Value::Null)
            }
            Self::Text { text } => serde_json::json!({ "text": text }),
            Self::Error { message } => serde_json::json!({ "message": message }),
            Self::StatusChange { status } => {
                serde_json::json!({ "status": status.to_string() })
            }
        }
    }

    /// Rebuild a payload from its persisted kind and data body.
    /// Returns `None` when the data does not match the kind's shape.
    pub fn from_parts(kind: JobEventKind, data: &serde_json::Value) -> Option<Self> {
        match kind {
            JobEventKind::Activity => {
                serde_json::from_value(data.clone()).ok().map(Self::Activity)
            }
            JobEventKind::Text => data
                .get("text")
                .and_then(|t| t.as_str())
                .map(|text| Self::Text { text: text.to_string() }),
            JobEventKind::Error => data
                .get("message")
                .and_then(|m| m.as_str())
                .map(|message| Self::Error { message: message.to_string() }),
            JobEventKind::StatusChange => data
                .get("status")
                .and_then(|s| s.as_str())
                .and_then(crate::job::JobStatus::parse)
                .map(|status| Self::StatusChange { status }),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
