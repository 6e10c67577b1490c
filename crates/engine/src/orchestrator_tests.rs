// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::spawner::{FakeRun, FakeSpawner};
use crate::store::FlakyStore;
use relay_adapters::FakeChannel;
use relay_core::{ActivityEvent, JobEventKind};
use relay_storage::Store;
use std::time::Duration;

struct Harness {
    orchestrator: Orchestrator<Arc<FakeSpawner>>,
    spawner: Arc<FakeSpawner>,
    channel: FakeChannel,
    store: Arc<Store>,
    conversation_id: String,
}

async fn harness(runs: Vec<FakeRun>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let conversation_id = store.create_conversation("test").unwrap();
    let spawner = Arc::new(FakeSpawner::scripted(runs));
    let channel = FakeChannel::new();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(channel.clone())).await;
    let orchestrator = Orchestrator::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&spawner),
        dispatcher,
    );
    Harness { orchestrator, spawner, channel, store, conversation_id }
}

/// Like [`harness`] but with a store whose event appends can be made
/// to fail on cue.
async fn flaky_harness(runs: Vec<FakeRun>) -> (Harness, Arc<FlakyStore>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let store = Arc::new(Store::open_in_memory().unwrap());
    let conversation_id = store.create_conversation("test").unwrap();
    let flaky = Arc::new(FlakyStore::new(Arc::clone(&store)));
    let spawner = Arc::new(FakeSpawner::scripted(runs));
    let channel = FakeChannel::new();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(channel.clone())).await;
    let orchestrator =
        Orchestrator::new(Arc::clone(&flaky) as Arc<dyn JobStore>, Arc::clone(&spawner), dispatcher);
    (Harness { orchestrator, spawner, channel, store, conversation_id }, flaky)
}

fn request(harness: &Harness, prompt: &str) -> CreateJob {
    CreateJob {
        conversation_id: harness.conversation_id.clone(),
        prompt: prompt.into(),
        source: "web".into(),
        history: Vec::new(),
    }
}

/// Drain a subscription until `Done`, returning the events seen.
async fn collect(mut rx: mpsc::Receiver<SubscriptionItem>) -> Vec<StoredEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(SubscriptionItem::Event(event))) => events.push(event),
            Ok(Some(SubscriptionItem::Done)) | Ok(None) => return events,
            Err(_) => panic!("subscription stalled; saw {events:?}"),
        }
    }
}

async fn wait_for_terminal(harness: &Harness, job_id: &str) -> Job {
    let events = collect(harness.orchestrator.subscribe(job_id, 0).unwrap()).await;
    assert!(!events.is_empty());
    harness.orchestrator.get_job(job_id).unwrap().unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn successful_run_completes_with_accumulated_text() {
    let harness = harness(vec![FakeRun::succeeding(vec![
        AgentEvent::Text("Working on it.".into()),
        AgentEvent::Activity(ActivityEvent::all_complete(false)),
        AgentEvent::Text("Done.".into()),
    ])])
    .await;
    let job = harness.orchestrator.create_job(request(&harness, "do it")).unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    let job = wait_for_terminal(&harness, &job.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result.as_deref(), Some("Working on it.\n\nDone."));
    assert!(job.error.is_none());
    assert!(job.pid.is_none());
    assert!(job.completed_at_ms.is_some());
}

#[tokio::test]
async fn event_log_brackets_the_run_with_status_changes() {
    let harness = harness(vec![FakeRun::succeeding(vec![
        AgentEvent::Text("hi".into()),
        AgentEvent::Activity(ActivityEvent::tool_start("Read", "t1", Some("/a.rs".into()))),
    ])])
    .await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();

    let events = collect(harness.orchestrator.subscribe(&job.id, 0).unwrap()).await;
    let kinds: Vec<JobEventKind> = events.iter().map(|event| event.kind).collect();
    assert_eq!(
        kinds,
        vec![
            JobEventKind::StatusChange,
            JobEventKind::Text,
            JobEventKind::Activity,
            JobEventKind::StatusChange,
        ]
    );
    assert!(events.windows(2).all(|pair| pair[0].seq < pair[1].seq));
}

#[tokio::test]
async fn nonzero_exit_fails_with_last_error() {
    let harness = harness(vec![FakeRun::failing(
        vec![
            AgentEvent::Error("first".into()),
            AgentEvent::Error("out of credits".into()),
        ],
        2,
    )])
    .await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();

    let job = wait_for_terminal(&harness, &job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("out of credits"));
    assert!(job.result.is_none());
}

#[tokio::test]
async fn nonzero_exit_without_errors_reports_the_code() {
    let harness = harness(vec![FakeRun::failing(vec![], 7)]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();

    let job = wait_for_terminal(&harness, &job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("agent exited with code 7"));
}

#[tokio::test]
async fn text_before_a_failure_is_not_kept_as_result() {
    let harness =
        harness(vec![FakeRun::failing(vec![AgentEvent::Text("partial".into())], 1)]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();

    let job = wait_for_terminal(&harness, &job.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn cancel_kills_a_running_job() {
    let harness =
        harness(vec![FakeRun::hanging(vec![AgentEvent::Text("started".into())])]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    let rx = harness.orchestrator.subscribe(&job.id, 0).unwrap();

    // Let the run task arm the kill switch before cancelling.
    wait_until(|| {
        harness
            .orchestrator
            .get_job(&job.id)
            .unwrap()
            .is_some_and(|job| job.status == JobStatus::Running)
    })
    .await;
    harness.orchestrator.cancel(&job.id).unwrap();

    collect(rx).await;
    let job = harness.orchestrator.get_job(&job.id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    // Cancellation wins over the kill exit code: no result, no error.
    assert!(job.result.is_none());
    assert!(job.error.is_none());
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let harness = harness(vec![FakeRun::hanging(vec![])]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    let rx = harness.orchestrator.subscribe(&job.id, 0).unwrap();

    harness.orchestrator.cancel(&job.id).unwrap();
    harness.orchestrator.cancel(&job.id).unwrap();
    collect(rx).await;

    // Cancelling a terminal job is still a no-op success.
    harness.orchestrator.cancel(&job.id).unwrap();
    let job = harness.orchestrator.get_job(&job.id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
}

#[tokio::test]
async fn cancel_unknown_job_is_an_error() {
    let harness = harness(vec![]).await;
    assert!(matches!(
        harness.orchestrator.cancel("job-missing"),
        Err(EngineError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn subscribe_replays_a_finished_job_from_the_log() {
    let harness = harness(vec![FakeRun::succeeding(vec![AgentEvent::Text("hi".into())])]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    wait_for_terminal(&harness, &job.id).await;

    // A fresh subscription long after completion sees the full log.
    let events = collect(harness.orchestrator.subscribe(&job.id, 0).unwrap()).await;
    assert_eq!(events.len(), 3);
    assert!(is_terminal_event(&events[2]));
}

#[tokio::test]
async fn subscribe_resumes_after_a_sequence() {
    let harness = harness(vec![FakeRun::succeeding(vec![
        AgentEvent::Text("one".into()),
        AgentEvent::Text("two".into()),
    ])])
    .await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    let all = collect(harness.orchestrator.subscribe(&job.id, 0).unwrap()).await;
    assert_eq!(all.len(), 4);

    let resumed = collect(harness.orchestrator.subscribe(&job.id, all[1].seq).unwrap()).await;
    assert_eq!(resumed, all[2..].to_vec());
}

#[tokio::test]
async fn subscribe_unknown_job_is_an_error() {
    let harness = harness(vec![]).await;
    assert!(matches!(
        harness.orchestrator.subscribe("job-missing", 0),
        Err(EngineError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn completion_notifies_exactly_once() {
    let harness = harness(vec![FakeRun::succeeding(vec![])]).await;
    let job = harness.orchestrator.create_job(request(&harness, "summarize the report")).unwrap();
    wait_for_terminal(&harness, &job.id).await;

    wait_until(|| !harness.channel.sent().is_empty()).await;
    let sent = harness.channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, relay_core::NotificationKind::JobCompleted);
    assert_eq!(sent[0].job_id, job.id);

    // No further notifications arrive after the first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.channel.sent().len(), 1);
}

#[tokio::test]
async fn failure_notification_carries_the_error() {
    let harness =
        harness(vec![FakeRun::failing(vec![AgentEvent::Error("boom".into())], 1)]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    wait_for_terminal(&harness, &job.id).await;

    wait_until(|| !harness.channel.sent().is_empty()).await;
    let sent = harness.channel.sent();
    assert_eq!(sent[0].kind, relay_core::NotificationKind::JobFailed);
    assert_eq!(sent[0].body, "boom");
}

#[tokio::test]
async fn cancellation_notifies_nothing() {
    let harness = harness(vec![FakeRun::hanging(vec![])]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    let rx = harness.orchestrator.subscribe(&job.id, 0).unwrap();
    harness.orchestrator.cancel(&job.id).unwrap();
    collect(rx).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.channel.sent().is_empty());
}

#[tokio::test]
async fn event_write_failure_kills_the_subprocess_and_fails_the_job() {
    // The hanging run only exits when killed, so a terminal row proves
    // the kill happened.
    let (harness, flaky) =
        flaky_harness(vec![FakeRun::hanging(vec![AgentEvent::Text("partial".into())])]).await;
    // Let the running marker through, fail the text event.
    flaky.fail_appends_after(1);
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();

    wait_until(|| {
        harness
            .store
            .get_job(&job.id)
            .unwrap()
            .is_some_and(|job| job.status == JobStatus::Failed)
    })
    .await;
    let job = harness.store.get_job(&job.id).unwrap().unwrap();
    assert_eq!(job.error.as_deref(), Some("event log write failed"));
    assert!(job.result.is_none());

    wait_until(|| !harness.channel.sent().is_empty()).await;
    let sent = harness.channel.sent();
    assert_eq!(sent[0].kind, relay_core::NotificationKind::JobFailed);
    assert_eq!(sent[0].body, "event log write failed");
}

#[tokio::test]
async fn failed_running_marker_write_aborts_the_job() {
    let (harness, flaky) = flaky_harness(vec![FakeRun::hanging(vec![])]).await;
    // The very first append (the running marker) fails.
    flaky.fail_appends_after(0);
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();

    wait_until(|| {
        harness
            .store
            .get_job(&job.id)
            .unwrap()
            .is_some_and(|job| job.status == JobStatus::Failed)
    })
    .await;
    let job = harness.store.get_job(&job.id).unwrap().unwrap();
    assert_eq!(job.error.as_deref(), Some("event log write failed"));
    assert!(harness.orchestrator.list_jobs(Some(JobStatus::Running)).unwrap().is_empty());
}

#[tokio::test]
async fn history_is_forwarded_to_the_spawner() {
    let harness = harness(vec![FakeRun::succeeding(vec![])]).await;
    let mut request = request(&harness, "continue");
    request.history = vec![relay_adapters::HistoryTurn {
        role: "user".into(),
        text: "earlier".into(),
    }];
    let job = harness.orchestrator.create_job(request).unwrap();
    wait_for_terminal(&harness, &job.id).await;

    let configs = harness.spawner.configs();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].prompt, "continue");
    assert_eq!(configs[0].history.len(), 1);
}

#[tokio::test]
async fn concurrent_jobs_run_independently() {
    let harness = harness(vec![
        FakeRun::succeeding(vec![AgentEvent::Text("a".into())]),
        FakeRun::failing(vec![], 1),
    ])
    .await;
    let first = harness.orchestrator.create_job(request(&harness, "first")).unwrap();
    let second = harness.orchestrator.create_job(request(&harness, "second")).unwrap();

    let first = wait_for_terminal(&harness, &first.id).await;
    let second = wait_for_terminal(&harness, &second.id).await;
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Failed);

    let listed = harness.orchestrator.list_jobs(None).unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn deleting_the_conversation_removes_job_and_log() {
    let harness = harness(vec![FakeRun::succeeding(vec![])]).await;
    let job = harness.orchestrator.create_job(request(&harness, "go")).unwrap();
    wait_for_terminal(&harness, &job.id).await;

    harness.store.delete_conversation(&harness.conversation_id).unwrap();
    assert!(harness.orchestrator.get_job(&job.id).unwrap().is_none());
    assert!(harness.store.events_after(&job.id, 0).unwrap().is_empty());
}
