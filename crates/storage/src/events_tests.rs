// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::Store;
use relay_core::{ActivityEvent, JobEventKind, JobEventPayload, JobStatus};

fn seeded(store: &Store) -> (String, String) {
    let conv = store.create_conversation("test").unwrap();
    let job = store.create_job(&conv, "prompt", "web").unwrap();
    (conv, job.id)
}

#[test]
fn append_assigns_monotonic_sequences() {
    let store = Store::open_in_memory().unwrap();
    let (_, job_id) = seeded(&store);

    let first = store
        .append_event(&job_id, &JobEventPayload::Text { text: "one".into() })
        .unwrap();
    let second = store
        .append_event(&job_id, &JobEventPayload::Text { text: "two".into() })
        .unwrap();
    assert!(second.seq > first.seq);
}

#[test]
fn events_after_supports_catch_up_from_any_sequence() {
    let store = Store::open_in_memory().unwrap();
    let (_, job_id) = seeded(&store);

    for i in 0..5 {
        store
            .append_event(&job_id, &JobEventPayload::Text { text: format!("t{i}") })
            .unwrap();
    }

    let all = store.events_after(&job_id, 0).unwrap();
    assert_eq!(all.len(), 5);

    let tail = store.events_after(&job_id, all[2].seq).unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].seq, all[3].seq);
    assert_eq!(tail[1].seq, all[4].seq);
}

#[test]
fn log_only_grows_never_changes() {
    let store = Store::open_in_memory().unwrap();
    let (_, job_id) = seeded(&store);

    store
        .append_event(&job_id, &JobEventPayload::Error { message: "x".into() })
        .unwrap();
    let before = store.events_after(&job_id, 0).unwrap();

    store
        .append_event(&job_id, &JobEventPayload::Text { text: "y".into() })
        .unwrap();
    let after = store.events_after(&job_id, 0).unwrap();

    assert_eq!(&after[..before.len()], &before[..], "existing prefix must not change");
    assert_eq!(after.len(), before.len() + 1);
}

#[test]
fn payload_roundtrips_through_storage() {
    let store = Store::open_in_memory().unwrap();
    let (_, job_id) = seeded(&store);

    let payloads = [
        JobEventPayload::Activity(ActivityEvent::tool_start(
            "Bash",
            "t1",
            Some("cargo test".into()),
        )),
        JobEventPayload::Text { text: "hello".into() },
        JobEventPayload::Error { message: "stderr line".into() },
        JobEventPayload::StatusChange { status: JobStatus::Running },
    ];
    for payload in &payloads {
        store.append_event(&job_id, payload).unwrap();
    }

    let stored = store.events_after(&job_id, 0).unwrap();
    assert_eq!(stored.len(), payloads.len());
    for (row, payload) in stored.iter().zip(&payloads) {
        assert_eq!(row.payload().as_ref(), Some(payload));
        assert_eq!(row.kind, payload.kind());
    }
    assert_eq!(stored[0].kind, JobEventKind::Activity);
}

#[test]
fn events_are_scoped_to_their_job() {
    let store = Store::open_in_memory().unwrap();
    let conv = store.create_conversation("test").unwrap();
    let a = store.create_job(&conv, "a", "web").unwrap();
    let b = store.create_job(&conv, "b", "web").unwrap();

    store.append_event(&a.id, &JobEventPayload::Text { text: "for a".into() }).unwrap();
    store.append_event(&b.id, &JobEventPayload::Text { text: "for b".into() }).unwrap();

    let a_events = store.events_after(&a.id, 0).unwrap();
    assert_eq!(a_events.len(), 1);
    assert_eq!(a_events[0].data["text"], "for a");
}

#[test]
fn deleting_conversation_cascades_to_jobs_and_events() {
    let store = Store::open_in_memory().unwrap();
    let (conv, job_id) = seeded(&store);
    store.append_event(&job_id, &JobEventPayload::Text { text: "t".into() }).unwrap();

    store.delete_conversation(&conv).unwrap();

    assert!(store.get_job(&job_id).unwrap().is_none());
    assert!(store.events_after(&job_id, 0).unwrap().is_empty());
}
