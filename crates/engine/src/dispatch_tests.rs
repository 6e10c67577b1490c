// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::FakeChannel;
use relay_core::{Notification, NotificationKind};

fn sample() -> Notification {
    Notification {
        kind: NotificationKind::JobFailed,
        job_id: "job-1".into(),
        title: "Job failed".into(),
        body: "exit code 2".into(),
    }
}

#[tokio::test]
async fn unavailable_channels_are_not_registered() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(FakeChannel::unavailable())).await;
    assert_eq!(dispatcher.channel_count(), 0);
}

#[tokio::test]
async fn dispatch_reaches_every_registered_channel() {
    let first = FakeChannel::new();
    let second = FakeChannel::new();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(first.clone())).await;
    dispatcher.register(Arc::new(second.clone())).await;

    dispatcher.dispatch(&sample()).await;
    assert_eq!(first.sent().len(), 1);
    assert_eq!(second.sent().len(), 1);
}

#[tokio::test]
async fn a_failing_channel_does_not_block_the_others() {
    let healthy = FakeChannel::new();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(FakeChannel::failing())).await;
    dispatcher.register(Arc::new(healthy.clone())).await;

    dispatcher.dispatch(&sample()).await;
    assert_eq!(healthy.sent().len(), 1);
}

#[tokio::test]
async fn dispatch_with_no_channels_is_a_no_op() {
    let dispatcher = Dispatcher::new();
    dispatcher.dispatch(&sample()).await;
}
