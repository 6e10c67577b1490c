// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent subprocess adapter: one external agent-CLI process per job,
//! its stdout normalized into typed events.

mod runner;
mod stream;

pub use runner::spawn_agent;
pub use stream::{ParsedEvent, StreamParser};

use relay_core::ActivityEvent;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// Environment variable overriding the agent binary path.
pub const AGENT_BIN_ENV: &str = "RELAY_AGENT_BIN";

/// Default agent binary name.
pub const DEFAULT_AGENT_BIN: &str = "claude";

/// How many prior turns are rendered into the prompt preamble.
pub const HISTORY_WINDOW: usize = 10;

/// One prior conversation turn for the prompt preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: String,
    pub text: String,
}

/// Configuration for one agent invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    /// Explicit binary path; falls back to `RELAY_AGENT_BIN`, then
    /// `claude`.
    pub binary: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl AgentConfig {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    pub fn history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Events delivered on the runner's channel while the subprocess runs.
///
/// Process exit is not an event; it is observed via
/// [`AgentHandle::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Visible assistant text (thinking regions already stripped).
    Text(String),
    /// Normalized tool/run activity.
    Activity(ActivityEvent),
    /// A stderr line or an adapter-level failure. Never fatal by
    /// itself; only the exit code decides success.
    Error(String),
}

/// Cloneable kill trigger for a running agent process.
///
/// Killing an already-exited process is a no-op.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    tx: mpsc::Sender<()>,
}

impl KillSwitch {
    pub fn kill(&self) {
        // Full channel or closed channel both mean a kill is already
        // in flight or the process is gone.
        let _ = self.tx.try_send(());
    }
}

/// Handle to a spawned agent process.
pub struct AgentHandle {
    pid: Option<u32>,
    kill: KillSwitch,
    exit_rx: oneshot::Receiver<i32>,
}

impl AgentHandle {
    /// Create a handle plus the driver side used by the process pump
    /// (or by a fake spawner in tests).
    pub fn pair(pid: Option<u32>) -> (Self, HandleDriver) {
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = oneshot::channel();
        (
            Self { pid, kill: KillSwitch { tx: kill_tx }, exit_rx },
            HandleDriver { kill_rx, exit_tx },
        )
    }

    /// OS process id, if the process spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    pub fn kill(&self) {
        self.kill.kill();
    }

    /// Await the exit code. Resolves exactly once: normal exit, spawn
    /// failure (code 1), or kill. A missing OS code (signal death)
    /// maps to -1.
    pub async fn wait(self) -> i32 {
        self.exit_rx.await.unwrap_or(-1)
    }
}

/// Driver side of an [`AgentHandle`]: receives kill requests, reports
/// the exit code.
pub struct HandleDriver {
    pub kill_rx: mpsc::Receiver<()>,
    pub exit_tx: oneshot::Sender<i32>,
}
