// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental parser for the agent CLI's JSON-lines output.
//!
//! The upstream process reports the same assistant/tool activity in
//! two shapes: a batch shape (whole `assistant` records with complete
//! content blocks) and a streaming shape (`content_block_start` /
//! `content_block_delta` / `content_block_stop` plus a terminal
//! `result` record). Tool results arrive separately as `user` records
//! that reference the originating tool id without repeating its name.
//!
//! The parser is a pure state machine: feed it raw stdout chunks, get
//! normalized events back. It never fails — malformed lines are
//! logged and skipped, unknown record kinds are dropped.

use relay_core::ActivityEvent;
use serde_json::Value;
use std::collections::HashMap;

/// Maximum length of a tool output preview, in characters.
const OUTPUT_PREVIEW_MAX: usize = 200;

/// Placeholder when a tool result references an id we never saw start.
const UNKNOWN_TOOL: &str = "tool";

/// A normalized event produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// Visible assistant text with thinking regions stripped.
    Text(String),
    Activity(ActivityEvent),
}

/// An in-flight streaming content block, keyed by record index.
enum OpenBlock {
    Text { buf: String },
    ToolUse { id: String },
}

/// Chunk-buffered JSON-lines parser. One instance per subprocess; the
/// correlation tables are private to that process and dropped with it.
#[derive(Default)]
pub struct StreamParser {
    buf: Vec<u8>,
    blocks: HashMap<u64, OpenBlock>,
    /// Accumulated raw input JSON per tool-invocation id.
    tool_inputs: HashMap<String, String>,
    /// Tool name per tool-invocation id, for labelling results.
    tool_names: HashMap<String, String>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stdout chunk. Complete lines are parsed; the trailing
    /// partial line (if any) is buffered for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ParsedEvent> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.parse_line(&line, &mut out);
        }
        out
    }

    fn parse_line(&mut self, line: &str, out: &mut Vec<ParsedEvent>) {
        if line.trim().is_empty() {
            return;
        }
        let record: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, "skipping malformed agent output line");
                return;
            }
        };
        match record.get("type").and_then(Value::as_str) {
            Some("assistant") => self.on_assistant(&record, out),
            Some("user") => self.on_tool_results(&record, out),
            Some("content_block_start") => self.on_block_start(&record, out),
            Some("content_block_delta") => self.on_block_delta(&record),
            Some("content_block_stop") => self.on_block_stop(&record, out),
            Some("result") => {
                let ok = record.get("subtype").and_then(Value::as_str) == Some("success");
                out.push(ParsedEvent::Activity(ActivityEvent::all_complete(!ok)));
            }
            // Unknown record kinds are dropped, never fatal.
            _ => {}
        }
    }

    /// Batch shape: a whole assistant message with complete content
    /// blocks. Tool-use blocks arrive with fully-formed inputs, so
    /// `tool_start` carries its input summary immediately.
    fn on_assistant(&mut self, record: &Value, out: &mut Vec<ParsedEvent>) {
        let blocks = record
            .pointer("/message/content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for block in &blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        emit_text(text, out);
                    }
                }
                Some("tool_use") => {
                    let (Some(id), Some(name)) = (
                        block.get("id").and_then(Value::as_str),
                        block.get("name").and_then(Value::as_str),
                    ) else {
                        continue;
                    };
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    self.tool_names.insert(id.to_string(), name.to_string());
                    self.tool_inputs.insert(id.to_string(), input.to_string());
                    let summary = summarize_input(&input);
                    let summary = (!summary.is_empty()).then_some(summary);
                    out.push(ParsedEvent::Activity(ActivityEvent::tool_start(name, id, summary)));
                }
                _ => {}
            }
        }
    }

    /// Streaming shape: a new block opens. Tool-use blocks announce
    /// their id and name but not yet their input.
    fn on_block_start(&mut self, record: &Value, out: &mut Vec<ParsedEvent>) {
        let Some(index) = record.get("index").and_then(Value::as_u64) else {
            return;
        };
        let Some(block) = record.get("content_block") else {
            return;
        };
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                self.blocks.insert(index, OpenBlock::Text { buf: String::new() });
            }
            Some("tool_use") => {
                let (Some(id), Some(name)) = (
                    block.get("id").and_then(Value::as_str),
                    block.get("name").and_then(Value::as_str),
                ) else {
                    return;
                };
                self.tool_names.insert(id.to_string(), name.to_string());
                self.tool_inputs.insert(id.to_string(), String::new());
                self.blocks.insert(index, OpenBlock::ToolUse { id: id.to_string() });
                out.push(ParsedEvent::Activity(ActivityEvent::tool_start(name, id, None)));
            }
            _ => {}
        }
    }

    /// Streaming shape: a fragment of text or of the tool's input JSON.
    fn on_block_delta(&mut self, record: &Value) {
        let Some(index) = record.get("index").and_then(Value::as_u64) else {
            return;
        };
        let Some(delta) = record.get("delta") else {
            return;
        };
        match self.blocks.get_mut(&index) {
            Some(OpenBlock::Text { buf }) => {
                if let Some(fragment) = delta.get("text").and_then(Value::as_str) {
                    buf.push_str(fragment);
                }
            }
            Some(OpenBlock::ToolUse { id }) => {
                if let Some(fragment) = delta.get("partial_json").and_then(Value::as_str) {
                    if let Some(input) = self.tool_inputs.get_mut(id.as_str()) {
                        input.push_str(fragment);
                    }
                }
            }
            None => {}
        }
    }

    /// Streaming shape: a block closes. Text is emitted whole (so the
    /// thinking-strip sees the full block); a tool-use block's
    /// accumulated input JSON is now parseable.
    fn on_block_stop(&mut self, record: &Value, out: &mut Vec<ParsedEvent>) {
        let Some(index) = record.get("index").and_then(Value::as_u64) else {
            return;
        };
        match self.blocks.remove(&index) {
            Some(OpenBlock::Text { buf }) => emit_text(&buf, out),
            Some(OpenBlock::ToolUse { id }) => {
                let raw = self.tool_inputs.get(&id).cloned().unwrap_or_default();
                match serde_json::from_str::<Value>(&raw) {
                    Ok(input) => {
                        let summary = summarize_input(&input);
                        if !summary.is_empty() {
                            out.push(ParsedEvent::Activity(ActivityEvent::tool_input(
                                id, summary,
                            )));
                        }
                    }
                    Err(error) => {
                        tracing::warn!(tool_id = %id, %error, "unparseable tool input");
                    }
                }
            }
            None => {}
        }
    }

    /// `user` records carry tool results correlated by id. A missing
    /// name degrades to a placeholder; it never drops the event.
    fn on_tool_results(&mut self, record: &Value, out: &mut Vec<ParsedEvent>) {
        let blocks = record
            .pointer("/message/content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for block in &blocks {
            if block.get("type").and_then(Value::as_str) != Some("tool_result") {
                continue;
            }
            let Some(id) = block.get("tool_use_id").and_then(Value::as_str) else {
                continue;
            };
            let name = self
                .tool_names
                .get(id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_TOOL.to_string());
            let is_error =
                block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            let preview = result_preview(block.get("content"));
            out.push(ParsedEvent::Activity(ActivityEvent::tool_end(
                name, id, is_error, preview,
            )));
        }
    }
}

/// Strip `<thinking>...</thinking>` regions and emit the remainder as
/// visible text. Text that is empty after stripping is not emitted.
fn emit_text(text: &str, out: &mut Vec<ParsedEvent>) {
    let visible = strip_thinking(text);
    let visible = visible.trim();
    if !visible.is_empty() {
        out.push(ParsedEvent::Text(visible.to_string()));
    }
}

fn strip_thinking(text: &str) -> String {
    const OPEN: &str = "<thinking>";
    const CLOSE: &str = "</thinking>";
    let mut result = text.to_string();
    while let Some(start) = result.find(OPEN) {
        let Some(end) = result[start..].find(CLOSE) else {
            break;
        };
        result.replace_range(start..start + end + CLOSE.len(), "");
    }
    result
}

/// Derive a one-line input summary from a tool's input object, by
/// priority: file path, then shell command, then search pattern.
fn summarize_input(input: &Value) -> String {
    for key in ["file_path", "command", "pattern"] {
        if let Some(value) = input.get(key).and_then(Value::as_str) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    String::new()
}

/// Extract a bounded text preview from a tool result's content, which
/// is either a plain string or a list of content blocks.
fn result_preview(content: Option<&Value>) -> Option<String> {
    let text = match content? {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|block| block.get("text").and_then(Value::as_str))
            .map(str::to_string)?,
        _ => return None,
    };
    Some(truncate_chars(&text, OUTPUT_PREVIEW_MAX))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
