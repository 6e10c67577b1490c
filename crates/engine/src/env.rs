// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven path and binary resolution.

use relay_adapters::agent::{AGENT_BIN_ENV, DEFAULT_AGENT_BIN};
use std::path::PathBuf;

/// Overrides the state directory (and thereby the database path).
pub const STATE_DIR_ENV: &str = "RELAY_STATE_DIR";

/// The agent binary to spawn: `RELAY_AGENT_BIN`, else `claude` on PATH.
pub fn agent_bin() -> String {
    std::env::var(AGENT_BIN_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_AGENT_BIN.to_string())
}

/// Where persistent state lives: `RELAY_STATE_DIR`, else
/// `$XDG_STATE_HOME/relay`, else `~/.local/state/relay`.
pub fn state_dir() -> PathBuf {
    if let Some(dir) = std::env::var(STATE_DIR_ENV).ok().filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(dir) = std::env::var("XDG_STATE_HOME").ok().filter(|v| !v.is_empty()) {
        return PathBuf::from(dir).join("relay");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local").join("state").join("relay")
}

pub fn db_path() -> PathBuf {
    state_dir().join("relay.db")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
