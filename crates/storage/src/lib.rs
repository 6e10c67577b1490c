// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-storage: SQLite persistence for jobs and their append-only
//! event logs, plus the conversation/message collaborator tables.

mod conversations;
mod error;
mod events;
mod jobs;
mod migrations;
mod store;

pub use conversations::MessageHit;
pub use error::StoreError;
pub use events::StoredEvent;
pub use store::Store;
