//! [`ShutdownSignal`] – the process-wide "running" flag.
//!
//! Every long-running loop holds a clone and checks it at each iteration
//! boundary. Because every wait in those loops is bounded by the poll timeout,
//! a triggered signal is observed within one timeout period.

use tokio_util::sync::CancellationToken;

/// Cheaply clonable shutdown flag. All clones observe the same trigger.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called on any clone.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// A signal that fires with this one but can also be triggered on its
    /// own, e.g. to end one peer session without stopping the process.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_triggered());
        signal.trigger();
        signal.trigger();
        assert!(observer.is_triggered());
    }

    #[tokio::test]
    async fn triggered_resolves_for_waiters() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter must wake")
            .unwrap();
    }

    #[test]
    fn child_follows_parent_but_not_the_reverse() {
        let parent = ShutdownSignal::new();
        let session = parent.child();
        session.trigger();
        assert!(!parent.is_triggered());

        let next = parent.child();
        parent.trigger();
        assert!(next.is_triggered());
    }
}
