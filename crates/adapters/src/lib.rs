// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-adapters: boundary adapters for the Relay job engine — the
//! agent subprocess runner with its output-stream parser, and the
//! desktop notification channel.

pub mod agent;
pub mod notify;

pub use agent::{
    spawn_agent, AgentConfig, AgentEvent, AgentHandle, HistoryTurn, KillSwitch, ParsedEvent,
    StreamParser,
};
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeChannel;
pub use notify::{DesktopChannel, NotifyChannel, NotifyError};
