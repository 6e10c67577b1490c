// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-core: domain types for the Relay job engine

pub mod clock;
pub mod event;
pub mod id;
pub mod job;
pub mod macros;
pub mod notification;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{
    ActivityEvent, ActivityKind, ActivityStatus, JobEventKind, JobEventPayload,
};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Job, JobStatus};
pub use notification::{Notification, NotificationKind};
