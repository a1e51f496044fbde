//! Cooperative shutdown token.
//!
//! The token is cloned into everything that needs to observe shutdown. It is
//! only ever checked between block steps and before waits, so a block that is
//! already being processed always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

/// Shared, clonable shutdown flag.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent; safe to call from a signal task.
    pub fn trigger(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested.
    pub async fn triggered(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // `trigger` cannot slip in between.
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration`, waking early on shutdown.
    ///
    /// Returns `true` if the full duration elapsed, `false` if shutdown cut it short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.triggered() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        assert!(!clone.is_triggered());
        token.trigger();
        assert!(clone.is_triggered());
        token.trigger(); // idempotent
        assert!(clone.is_triggered());
    }

    #[tokio::test]
    async fn sleep_completes_without_shutdown() {
        let token = ShutdownToken::new();
        assert!(token.sleep(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn trigger_interrupts_sleep() {
        let token = ShutdownToken::new();
        let sleeper = token.clone();
        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(3600)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.trigger();

        let completed = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sleep was not interrupted")
            .unwrap();
        assert!(!completed);
    }

    #[tokio::test]
    async fn sleep_after_trigger_returns_immediately() {
        let token = ShutdownToken::new();
        token.trigger();
        assert!(!token.sleep(Duration::from_secs(3600)).await);
        token.triggered().await;
    }
}
