// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation helpers

/// Length of the random suffix in generated IDs.
const ID_LEN: usize = 19;

/// Generate a new job ID: `job-` followed by a 19-character nanoid.
pub fn job_id() -> String {
    format!("job-{}", nanoid::nanoid!(ID_LEN))
}

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
