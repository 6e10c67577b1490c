// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort notification fan-out.

use relay_adapters::NotifyChannel;
use relay_core::Notification;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Holds the notification channels that answered their availability
/// probe. Dispatch is infallible; per-channel failures are logged.
#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotifyChannel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe the channel once; keep it only if its backend answers.
    pub async fn register(&mut self, channel: Arc<dyn NotifyChannel>) {
        if channel.available().await {
            tracing::info!(channel = channel.name(), "notification channel registered");
            self.channels.push(channel);
        } else {
            tracing::warn!(channel = channel.name(), "notification channel unavailable, skipping");
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send to every registered channel concurrently. Returns once all
    /// sends have settled; failures never propagate.
    pub async fn dispatch(&self, notification: &Notification) {
        let mut sends = JoinSet::new();
        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let notification = notification.clone();
            sends.spawn(async move {
                if let Err(error) = channel.send(&notification).await {
                    tracing::warn!(
                        channel = channel.name(),
                        job_id = %notification.job_id,
                        %error,
                        "notification send failed"
                    );
                }
            });
        }
        while sends.join_next().await.is_some() {}
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
