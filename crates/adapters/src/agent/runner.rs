// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns the agent CLI and pumps its output into typed events.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;

use super::{
    AgentConfig, AgentEvent, AgentHandle, HandleDriver, ParsedEvent, StreamParser, AGENT_BIN_ENV,
    DEFAULT_AGENT_BIN, HISTORY_WINDOW,
};

/// Spawn one agent process for `config`, delivering events on `tx`.
///
/// Always returns a usable handle: if the spawn itself fails, an
/// [`AgentEvent::Error`] is delivered and the handle resolves with
/// exit code 1.
pub async fn spawn_agent(config: AgentConfig, tx: mpsc::Sender<AgentEvent>) -> AgentHandle {
    let binary = config
        .binary
        .clone()
        .or_else(|| std::env::var(AGENT_BIN_ENV).ok())
        .unwrap_or_else(|| DEFAULT_AGENT_BIN.to_string());
    let prompt = render_prompt(&config);

    let mut command = Command::new(&binary);
    command
        .arg("-p")
        .arg(&prompt)
        .arg("--output-format")
        .arg("stream-json")
        .arg("--verbose")
        .arg("--permission-mode")
        .arg("bypassPermissions")
        .env("NO_COLOR", "1")
        .env("FORCE_COLOR", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &config.cwd {
        command.current_dir(cwd);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            tracing::error!(%binary, %error, "failed to spawn agent process");
            let _ = tx
                .send(AgentEvent::Error(format!("failed to spawn {binary}: {error}")))
                .await;
            let (handle, driver) = AgentHandle::pair(None);
            let _ = driver.exit_tx.send(1);
            return handle;
        }
    };

    let pid = child.id();
    tracing::debug!(%binary, pid, "agent process started");
    let (handle, driver) = AgentHandle::pair(pid);

    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if !line.is_empty() && tx.send(AgentEvent::Error(line)).await.is_err() {
                    break;
                }
            }
        });
    }

    let stdout = child.stdout.take();
    tokio::spawn(pump(child, stdout, tx, driver));
    handle
}

/// Read stdout to EOF, feeding the stream parser and honoring kill
/// requests, then reap the process and report its exit code.
async fn pump(
    mut child: Child,
    stdout: Option<ChildStdout>,
    tx: mpsc::Sender<AgentEvent>,
    driver: HandleDriver,
) {
    let HandleDriver { mut kill_rx, exit_tx } = driver;
    let mut parser = StreamParser::new();
    let mut buf = [0u8; 8192];
    // Once every kill switch is dropped the branch is disabled, so the
    // loop does not spin on a closed channel.
    let mut kill_armed = true;

    if let Some(mut stdout) = stdout {
        loop {
            tokio::select! {
                read = stdout.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => {
                        for parsed in parser.push(&buf[..n]) {
                            let event = match parsed {
                                ParsedEvent::Text(text) => AgentEvent::Text(text),
                                ParsedEvent::Activity(activity) => AgentEvent::Activity(activity),
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "agent stdout read failed");
                        break;
                    }
                },
                request = kill_rx.recv(), if kill_armed => match request {
                    Some(()) => {
                        tracing::info!(pid = child.id(), "killing agent process");
                        if let Err(error) = child.start_kill() {
                            tracing::warn!(%error, "kill failed");
                        }
                    }
                    None => kill_armed = false,
                },
            }
        }
    }

    let code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(error) => {
            tracing::warn!(%error, "failed to reap agent process");
            -1
        }
    };
    tracing::debug!(code, "agent process exited");
    let _ = exit_tx.send(code);
}

/// The agent's replies are read aloud, so keep them terse and plain.
const VOICE_DIRECTIVE: &str =
    "Respond in a spoken, conversational style: one or two short sentences, no markup.";

/// Render the full `-p` prompt: a bounded window of prior turns as a
/// bracketed preamble, the voice directive, then the new prompt.
fn render_prompt(config: &AgentConfig) -> String {
    let mut out = String::new();
    if !config.history.is_empty() {
        let skip = config.history.len().saturating_sub(HISTORY_WINDOW);
        out.push_str("[Recent conversation]\n");
        for turn in config.history.iter().skip(skip) {
            out.push_str(&turn.role);
            out.push_str(": ");
            out.push_str(&turn.text);
            out.push('\n');
        }
        out.push_str("[/Recent conversation]\n\n");
    }
    out.push_str(VOICE_DIRECTIVE);
    out.push_str("\n\n");
    out.push_str(&config.prompt);
    out
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
