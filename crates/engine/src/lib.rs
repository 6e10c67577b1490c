// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-engine: the job orchestrator.
//!
//! Owns the full job lifecycle: create a queued row, run one agent
//! subprocess per job, persist every parsed event to the append-only
//! log before fanning it out to live subscribers, finalize the status,
//! and fire completion notifications.

pub mod dispatch;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod spawner;
pub mod store;

pub use dispatch::Dispatcher;
pub use error::EngineError;
pub use orchestrator::{CreateJob, Orchestrator, SubscriptionItem};
#[cfg(any(test, feature = "test-support"))]
pub use spawner::{FakeRun, FakeSpawner};
pub use spawner::{AgentSpawner, CliSpawner};
#[cfg(any(test, feature = "test-support"))]
pub use store::FlakyStore;
pub use store::JobStore;
