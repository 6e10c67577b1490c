// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// Environment variables are process-global, so all the precedence
// checks live in one test.
#[test]
fn state_dir_resolution_precedence() {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());

    std::env::set_var(STATE_DIR_ENV, "/tmp/relay-explicit");
    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
    assert_eq!(state_dir(), PathBuf::from("/tmp/relay-explicit"));

    std::env::remove_var(STATE_DIR_ENV);
    assert_eq!(state_dir(), PathBuf::from("/tmp/xdg-state/relay"));
    assert_eq!(db_path(), PathBuf::from("/tmp/xdg-state/relay/relay.db"));

    std::env::remove_var("XDG_STATE_HOME");
    assert_eq!(state_dir(), PathBuf::from(home).join(".local/state/relay"));

    std::env::remove_var(relay_adapters::agent::AGENT_BIN_ENV);
    assert_eq!(agent_bin(), "claude");
}
