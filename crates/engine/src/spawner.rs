// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam between the orchestrator and the agent subprocess, so tests
//! can script a run without spawning anything.

use async_trait::async_trait;
use relay_adapters::{spawn_agent, AgentConfig, AgentEvent, AgentHandle};
use tokio::sync::mpsc;

#[async_trait]
pub trait AgentSpawner: Send + Sync + 'static {
    async fn spawn(&self, config: AgentConfig, tx: mpsc::Sender<AgentEvent>) -> AgentHandle;
}

#[async_trait]
impl<S: AgentSpawner> AgentSpawner for std::sync::Arc<S> {
    async fn spawn(&self, config: AgentConfig, tx: mpsc::Sender<AgentEvent>) -> AgentHandle {
        self.as_ref().spawn(config, tx).await
    }
}

/// Production spawner: one real agent CLI process per call.
pub struct CliSpawner;

#[async_trait]
impl AgentSpawner for CliSpawner {
    async fn spawn(&self, config: AgentConfig, tx: mpsc::Sender<AgentEvent>) -> AgentHandle {
        spawn_agent(config, tx).await
    }
}

/// One scripted agent run for [`FakeSpawner`].
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct FakeRun {
    pub events: Vec<AgentEvent>,
    pub exit_code: i32,
    /// Deliver the events, then block until killed; exit 137 on kill.
    pub hang_until_kill: bool,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeRun {
    pub fn succeeding(events: Vec<AgentEvent>) -> Self {
        Self { events, exit_code: 0, hang_until_kill: false }
    }

    pub fn failing(events: Vec<AgentEvent>, exit_code: i32) -> Self {
        Self { events, exit_code, hang_until_kill: false }
    }

    pub fn hanging(events: Vec<AgentEvent>) -> Self {
        Self { events, exit_code: 0, hang_until_kill: true }
    }
}

/// Scripted spawner: each `spawn` consumes the next [`FakeRun`] and
/// replays it on the event channel. Records every config it was given.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeSpawner {
    runs: parking_lot::Mutex<std::collections::VecDeque<FakeRun>>,
    configs: parking_lot::Mutex<Vec<AgentConfig>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(runs: Vec<FakeRun>) -> Self {
        Self {
            runs: parking_lot::Mutex::new(runs.into()),
            configs: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn push_run(&self, run: FakeRun) {
        self.runs.lock().push_back(run);
    }

    /// Configs seen so far, in spawn order.
    pub fn configs(&self) -> Vec<AgentConfig> {
        self.configs.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AgentSpawner for FakeSpawner {
    async fn spawn(&self, config: AgentConfig, tx: mpsc::Sender<AgentEvent>) -> AgentHandle {
        self.configs.lock().push(config);
        let run = self.runs.lock().pop_front().unwrap_or_default();
        let (handle, driver) = AgentHandle::pair(Some(4242));
        tokio::spawn(async move {
            let relay_adapters::agent::HandleDriver { mut kill_rx, exit_tx } = driver;
            for event in run.events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            let code = if run.hang_until_kill {
                match kill_rx.recv().await {
                    Some(()) => 137,
                    None => run.exit_code,
                }
            } else {
                run.exit_code
            };
            drop(tx);
            let _ = exit_tx.send(code);
        });
        handle
    }
}
