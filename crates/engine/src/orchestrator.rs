// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle orchestration.
//!
//! One run task per job: spawn the agent subprocess, persist every
//! parsed event to the store before broadcasting it to live
//! subscribers, then finalize the status from the exit code. A
//! cancellation requested at any point wins over the exit code.

use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::spawner::AgentSpawner;
use crate::store::JobStore;
use parking_lot::Mutex;
use relay_adapters::{AgentConfig, AgentEvent, HistoryTurn, KillSwitch};
use relay_core::{Job, JobEventPayload, JobStatus, Notification, NotificationKind};
use relay_storage::{StoreError, StoredEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Live fan-out buffer per job. A subscriber that falls further behind
/// than this refills from the store.
const FEED_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const SUBSCRIPTION_CAPACITY: usize = 64;
/// Notification body length bound.
const BODY_PREVIEW_MAX: usize = 120;

/// Request to create and immediately run a job.
#[derive(Debug, Clone, Default)]
pub struct CreateJob {
    pub conversation_id: String,
    pub prompt: String,
    pub source: String,
    /// Prior conversation turns rendered into the agent prompt.
    pub history: Vec<HistoryTurn>,
}

/// One item on a subscription channel: a log event, or the marker that
/// the log is complete and no further events will come.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionItem {
    Event(StoredEvent),
    Done,
}

struct RunningJob {
    feed: broadcast::Sender<StoredEvent>,
    /// Absent between job creation and subprocess spawn.
    kill: Option<KillSwitch>,
    cancel_requested: bool,
}

struct Inner<S> {
    store: Arc<dyn JobStore>,
    spawner: S,
    dispatcher: Dispatcher,
    running: Mutex<HashMap<String, RunningJob>>,
}

pub struct Orchestrator<S: AgentSpawner> {
    inner: Arc<Inner<S>>,
}

impl<S: AgentSpawner> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: AgentSpawner> Orchestrator<S> {
    pub fn new(store: Arc<dyn JobStore>, spawner: S, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                spawner,
                dispatcher,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Insert the queued row and start the run task. There is no queue
    /// drain layer: every job runs as soon as it is created, one
    /// subprocess per job.
    pub fn create_job(&self, request: CreateJob) -> Result<Job, EngineError> {
        let job = self.inner.store.create_job(
            &request.conversation_id,
            &request.prompt,
            &request.source,
        )?;
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        self.inner.running.lock().insert(
            job.id.clone(),
            RunningJob { feed, kill: None, cancel_requested: false },
        );
        tracing::info!(job_id = %job.id, source = %job.source, "job created");
        tokio::spawn(run(Arc::clone(&self.inner), job.clone(), request.history));
        Ok(job)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>, EngineError> {
        Ok(self.inner.store.get_job(id)?)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>, EngineError> {
        Ok(self.inner.store.list_jobs(status)?)
    }

    /// Request cancellation. Idempotent: cancelling a terminal job (or
    /// cancelling twice) is a no-op success.
    pub fn cancel(&self, id: &str) -> Result<(), EngineError> {
        {
            let mut running = self.inner.running.lock();
            if let Some(entry) = running.get_mut(id) {
                entry.cancel_requested = true;
                if let Some(kill) = &entry.kill {
                    kill.kill();
                }
                tracing::info!(job_id = %id, "cancellation requested");
                return Ok(());
            }
        }
        let job = self
            .inner
            .store
            .get_job(id)?
            .ok_or_else(|| EngineError::JobNotFound(id.to_string()))?;
        if job.is_terminal() {
            return Ok(());
        }
        // No run task owns this job (e.g. it predates this process);
        // finalize it directly.
        let job = self.inner.store.mark_cancelled(id)?;
        self.inner
            .store
            .append_event(id, &JobEventPayload::StatusChange { status: job.status })?;
        tracing::info!(job_id = %id, "orphaned job cancelled");
        Ok(())
    }

    /// Replay stored events after `after_seq`, then tail the live feed
    /// until the terminal `StatusChange`, then yield
    /// [`SubscriptionItem::Done`]. Pass 0 to replay the full log.
    pub fn subscribe(
        &self,
        job_id: &str,
        after_seq: i64,
    ) -> Result<mpsc::Receiver<SubscriptionItem>, EngineError> {
        if self.inner.store.get_job(job_id)?.is_none() {
            return Err(EngineError::JobNotFound(job_id.to_string()));
        }
        // Subscribe to the feed before reading the backlog so nothing
        // falls between; overlap is deduplicated by sequence.
        let feed = self
            .inner
            .running
            .lock()
            .get(job_id)
            .map(|entry| entry.feed.subscribe());
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        tokio::spawn(forward(
            Arc::clone(&self.inner.store),
            job_id.to_string(),
            after_seq,
            feed,
            tx,
        ));
        Ok(rx)
    }
}

enum Outcome {
    Completed(String),
    Failed(String),
    Cancelled,
}

/// Append to the log, then fan out live. Persistence comes first so a
/// catch-up reader can never be ahead of a live one.
fn record<S>(inner: &Inner<S>, job_id: &str, payload: &JobEventPayload) -> Result<(), StoreError> {
    let stored = inner.store.append_event(job_id, payload)?;
    if let Some(entry) = inner.running.lock().get(job_id) {
        // No live subscribers is fine.
        let _ = entry.feed.send(stored);
    }
    Ok(())
}

async fn run<S: AgentSpawner>(inner: Arc<Inner<S>>, job: Job, history: Vec<HistoryTurn>) {
    let job_id = job.id.clone();

    let cancelled_early = inner
        .running
        .lock()
        .get(&job_id)
        .map(|entry| entry.cancel_requested)
        .unwrap_or(false);
    if cancelled_early {
        finalize(&inner, &job_id, Outcome::Cancelled).await;
        return;
    }

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let config = AgentConfig::new(job.prompt.clone()).history(history);
    let handle = inner.spawner.spawn(config, tx).await;

    let mut persist_failed = false;
    match inner.store.mark_running(&job_id, handle.pid()) {
        Ok(running) => {
            let payload = JobEventPayload::StatusChange { status: running.status };
            if let Err(error) = record(&inner, &job_id, &payload) {
                // The log is the source of truth; a job whose events
                // cannot be written cannot continue.
                tracing::error!(job_id = %job_id, %error, "event log write failed, killing job");
                persist_failed = true;
                handle.kill();
            }
        }
        Err(error) => {
            tracing::error!(job_id = %job_id, %error, "failed to mark job running");
            handle.kill();
            drop(rx);
            let _ = handle.wait().await;
            finalize(&inner, &job_id, Outcome::Failed("job failed to start".to_string())).await;
            return;
        }
    }

    if !persist_failed {
        // Arm the kill switch; honor a cancel that raced the spawn.
        let mut running = inner.running.lock();
        if let Some(entry) = running.get_mut(&job_id) {
            entry.kill = Some(handle.kill_switch());
            if entry.cancel_requested {
                handle.kill();
            }
        }
    }

    let mut result_text = String::new();
    let mut last_error: Option<String> = None;

    while !persist_failed {
        let Some(event) = rx.recv().await else { break };
        let payload = match event {
            AgentEvent::Text(text) => {
                if !result_text.is_empty() {
                    result_text.push_str("\n\n");
                }
                result_text.push_str(&text);
                JobEventPayload::Text { text }
            }
            AgentEvent::Activity(activity) => JobEventPayload::Activity(activity),
            AgentEvent::Error(message) => {
                last_error = Some(message.clone());
                JobEventPayload::Error { message }
            }
        };
        if let Err(error) = record(&inner, &job_id, &payload) {
            tracing::error!(job_id = %job_id, %error, "event log write failed, killing job");
            persist_failed = true;
            handle.kill();
        }
    }
    drop(rx);

    let code = handle.wait().await;

    let cancelled = inner
        .running
        .lock()
        .get(&job_id)
        .map(|entry| entry.cancel_requested)
        .unwrap_or(false);

    let outcome = if cancelled {
        Outcome::Cancelled
    } else if persist_failed {
        Outcome::Failed("event log write failed".to_string())
    } else if code == 0 {
        Outcome::Completed(result_text)
    } else {
        Outcome::Failed(last_error.unwrap_or_else(|| format!("agent exited with code {code}")))
    };
    finalize(&inner, &job_id, outcome).await;
}

/// Apply the terminal transition, append its `StatusChange` event,
/// drop the job from the running map, and fire at most one
/// notification (completed/failed only; cancellation notifies nothing).
async fn finalize<S: AgentSpawner>(inner: &Arc<Inner<S>>, job_id: &str, outcome: Outcome) {
    let transition = match &outcome {
        Outcome::Completed(result) => inner.store.mark_completed(job_id, result),
        Outcome::Failed(message) => inner.store.mark_failed(job_id, message),
        Outcome::Cancelled => inner.store.mark_cancelled(job_id),
    };
    let job = match transition {
        Ok(job) => job,
        Err(error) => {
            tracing::error!(job_id = %job_id, %error, "failed to finalize job");
            inner.running.lock().remove(job_id);
            return;
        }
    };
    let payload = JobEventPayload::StatusChange { status: job.status };
    if let Err(error) = record(inner, job_id, &payload) {
        tracing::error!(job_id = %job_id, %error, "failed to record terminal transition");
    }
    inner.running.lock().remove(job_id);
    tracing::info!(job_id = %job_id, status = %job.status, "job finished");

    let notification = match job.status {
        JobStatus::Completed => Some(Notification {
            kind: NotificationKind::JobCompleted,
            job_id: job.id.clone(),
            title: "Job completed".to_string(),
            body: snippet(&job.prompt),
        }),
        JobStatus::Failed => Some(Notification {
            kind: NotificationKind::JobFailed,
            job_id: job.id.clone(),
            title: "Job failed".to_string(),
            body: job.error.clone().unwrap_or_else(|| snippet(&job.prompt)),
        }),
        _ => None,
    };
    if let Some(notification) = notification {
        inner.dispatcher.dispatch(&notification).await;
    }
}

fn snippet(text: &str) -> String {
    let cut = relay_core::id::short(text, BODY_PREVIEW_MAX);
    if cut.len() < text.len() {
        format!("{cut}…")
    } else {
        text.to_string()
    }
}

fn is_terminal_event(event: &StoredEvent) -> bool {
    matches!(
        event.payload(),
        Some(JobEventPayload::StatusChange { status }) if status.is_terminal()
    )
}

/// Send stored events after `last_seq`. `Some(true)` when a terminal
/// status event went out, `None` when the subscriber went away.
async fn send_backlog(
    store: &dyn JobStore,
    job_id: &str,
    last_seq: &mut i64,
    tx: &mpsc::Sender<SubscriptionItem>,
) -> Option<bool> {
    let events = match store.events_after(job_id, *last_seq) {
        Ok(events) => events,
        Err(error) => {
            tracing::warn!(job_id = %job_id, %error, "failed to read event backlog");
            return Some(false);
        }
    };
    for event in events {
        *last_seq = event.seq;
        let terminal = is_terminal_event(&event);
        if tx.send(SubscriptionItem::Event(event)).await.is_err() {
            return None;
        }
        if terminal {
            return Some(true);
        }
    }
    Some(false)
}

/// Subscription pump: backlog first, then the live feed deduplicated
/// by sequence, then `Done` once the terminal status has gone out.
async fn forward(
    store: Arc<dyn JobStore>,
    job_id: String,
    after_seq: i64,
    feed: Option<broadcast::Receiver<StoredEvent>>,
    tx: mpsc::Sender<SubscriptionItem>,
) {
    let mut last_seq = after_seq;
    let mut done = match send_backlog(&*store, &job_id, &mut last_seq, &tx).await {
        Some(done) => done,
        None => return,
    };

    if let Some(mut feed) = feed {
        while !done {
            match feed.recv().await {
                Ok(event) => {
                    if event.seq <= last_seq {
                        continue;
                    }
                    last_seq = event.seq;
                    let terminal = is_terminal_event(&event);
                    if tx.send(SubscriptionItem::Event(event)).await.is_err() {
                        return;
                    }
                    done = terminal;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(job_id = %job_id, missed, "subscriber lagged, refilling from the log");
                    match send_backlog(&*store, &job_id, &mut last_seq, &tx).await {
                        Some(terminal) => done = terminal,
                        None => return,
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    if !done {
        // The feed closed (or never existed) before a terminal event
        // reached us; the log has the rest.
        if send_backlog(&*store, &job_id, &mut last_seq, &tx).await.is_none() {
            return;
        }
    }
    let _ = tx.send(SubscriptionItem::Done).await;
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
