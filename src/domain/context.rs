//! Request-scoped deadline and cancellation context

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Ambient caller context carried into every analysis call.
///
/// A context optionally carries a deadline and any number of cancellation
/// signals. It is cancelled as soon as one signal fires or its handle is
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    signals: Vec<watch::Receiver<bool>>,
}

/// Owning side of a cancellation signal. Dropping the handle cancels.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl RequestContext {
    /// Context with neither deadline nor cancellation
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            signals: Vec::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub(crate) fn from_parts(deadline: Option<Instant>, signals: Vec<watch::Receiver<bool>>) -> Self {
        Self { deadline, signals }
    }

    /// Attach a fresh cancellation signal, returning its handle
    pub fn cancellable(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.signals.push(receiver);
        (self, CancelHandle { sender })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn signals(&self) -> &[watch::Receiver<bool>] {
        &self.signals
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals
            .iter()
            .any(|rx| *rx.borrow() || rx.has_changed().is_err())
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves once any signal fires. Never resolves without signals.
    pub async fn cancelled(&self) {
        if self.signals.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.signals.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });

        futures::future::select_all(waits).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context() {
        let ctx = RequestContext::background();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_cancelled());
        assert!(!ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_saturates_at_zero() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(10));
        assert_eq!(ctx.remaining(), Some(Duration::from_millis(10)));

        tokio::time::advance(Duration::from_millis(25)).await;

        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert!(ctx.is_expired());
    }

    #[test]
    fn test_cancel_handle_marks_context() {
        let (ctx, handle) = RequestContext::background().cancellable();
        assert!(!ctx.is_cancelled());

        handle.cancel();

        assert!(ctx.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_dropping_handle_cancels() {
        let (ctx, handle) = RequestContext::background().cancellable();
        drop(handle);
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_clones_share_signal() {
        let (ctx, handle) = RequestContext::background().cancellable();
        let cloned = ctx.clone();

        handle.cancel();

        assert!(cloned.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_signal() {
        let (ctx, handle) = RequestContext::background().cancellable();

        let waiter = tokio::spawn(async move { ctx.cancelled().await });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_pending_without_signals() {
        let ctx = RequestContext::background();
        let result = tokio::time::timeout(Duration::from_millis(50), ctx.cancelled()).await;
        assert!(result.is_err());
    }
}
