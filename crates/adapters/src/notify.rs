// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notification channel.
//!
//! Delivery is strictly best effort: a failed or unavailable channel
//! is logged and never affects job execution.

use async_trait::async_trait;
use relay_core::Notification;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification send failed: {0}")]
    Send(String),
}

/// A place notifications can be delivered to. Channels are probed once
/// at registration; an unavailable channel is skipped thereafter.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the channel's backend is reachable right now.
    async fn available(&self) -> bool;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// The OS desktop notification center.
pub struct DesktopChannel;

#[async_trait]
impl NotifyChannel for DesktopChannel {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn available(&self) -> bool {
        tokio::task::spawn_blocking(probe_backend).await.unwrap_or(false)
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let title = notification.title.clone();
        let body = notification.body.clone();
        tokio::task::spawn_blocking(move || {
            #[cfg(target_os = "macos")]
            ensure_macos_application();
            notify_rust::Notification::new()
                .summary(&title)
                .body(&body)
                .show()
                .map(|_| ())
                .map_err(|error| NotifyError::Send(error.to_string()))
        })
        .await
        .map_err(|error| NotifyError::Send(error.to_string()))?
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn probe_backend() -> bool {
    // Linux delivery goes over D-Bus; no session bus means no channel.
    notify_rust::get_server_information().is_ok()
}

#[cfg(any(target_os = "macos", not(unix)))]
fn probe_backend() -> bool {
    true
}

/// macOS refuses notifications from unbundled binaries, so deliver
/// under an existing bundle identity.
#[cfg(target_os = "macos")]
fn ensure_macos_application() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Err(error) = mac_notification_sys::set_application("com.apple.Terminal") {
            tracing::warn!(%error, "failed to set notification application");
        }
    });
}

/// In-memory channel with scriptable availability and failure.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeChannel {
    inner: std::sync::Arc<FakeInner>,
}

#[cfg(any(test, feature = "test-support"))]
struct FakeInner {
    available: bool,
    failing: bool,
    sent: parking_lot::Mutex<Vec<Notification>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeChannel {
    pub fn new() -> Self {
        Self::build(true, false)
    }

    /// A channel whose probe reports no backend.
    pub fn unavailable() -> Self {
        Self::build(false, false)
    }

    /// A channel that accepts the probe but fails every send.
    pub fn failing() -> Self {
        Self::build(true, true)
    }

    fn build(available: bool, failing: bool) -> Self {
        Self {
            inner: std::sync::Arc::new(FakeInner {
                available,
                failing,
                sent: parking_lot::Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.inner.sent.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clone for FakeChannel {
    fn clone(&self) -> Self {
        Self { inner: std::sync::Arc::clone(&self.inner) }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl NotifyChannel for FakeChannel {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn available(&self) -> bool {
        self.inner.available
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.inner.failing {
            return Err(NotifyError::Send("scripted failure".to_string()));
        }
        self.inner.sent.lock().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
