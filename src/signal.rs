//! Cancellation plumbing for a single attempt.
//!
//! A [`CompositeSignal`] is the logical OR of any number of
//! [`CancellationToken`]s. The executor builds one per attempt from the
//! caller's token (if any) and a fresh attempt token owned by an
//! [`AttemptController`].

use futures_util::future::select_all;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Fires as soon as any of its source tokens fires.
#[derive(Clone, Debug, Default)]
pub struct CompositeSignal {
    sources: Vec<CancellationToken>,
}

impl CompositeSignal {
    pub fn new<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = CancellationToken>,
    {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    /// Adds another source to the fan-in.
    pub fn push(&mut self, source: CancellationToken) {
        self.sources.push(source);
    }

    pub fn is_cancelled(&self) -> bool {
        self.sources.iter().any(CancellationToken::is_cancelled)
    }

    /// Completes once any source is cancelled. Never completes with no sources.
    pub async fn cancelled(&self) {
        if self.sources.is_empty() {
            return std::future::pending().await;
        }
        let waits = self
            .sources
            .iter()
            .map(|source| Box::pin(source.cancelled()));
        select_all(waits).await;
    }
}

/// Owns the cancellation token of one attempt.
///
/// The token is cancelled when the controller is dropped, so whatever the
/// transport spawned on it is released on every exit path.
#[derive(Debug)]
pub struct AttemptController {
    token: CancellationToken,
    signal: CompositeSignal,
    _guard: DropGuard,
}

impl AttemptController {
    pub fn new(caller: Option<&CancellationToken>) -> Self {
        let token = CancellationToken::new();
        let mut signal = CompositeSignal::new(caller.cloned());
        signal.push(token.clone());
        Self {
            _guard: token.clone().drop_guard(),
            token,
            signal,
        }
    }

    /// Signal handed to the transport: fires on caller cancellation or [`abort`](Self::abort).
    pub fn signal(&self) -> &CompositeSignal {
        &self.signal
    }

    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::{AttemptController, CompositeSignal};

    #[tokio::test]
    async fn composite_fires_when_any_source_fires() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let signal = CompositeSignal::new([a.clone(), b.clone()]);
        assert!(!signal.is_cancelled());

        b.cancel();
        assert!(signal.is_cancelled());
        tokio::time::timeout(Duration::from_millis(50), signal.cancelled())
            .await
            .expect("composite must observe cancellation");
        assert!(!a.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_composite_never_fires() {
        let signal = CompositeSignal::default();
        let waited = tokio::time::timeout(Duration::from_secs(60), signal.cancelled()).await;
        assert!(waited.is_err());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn attempt_abort_does_not_touch_caller_token() {
        let caller = CancellationToken::new();
        let controller = AttemptController::new(Some(&caller));
        controller.abort();
        assert!(controller.is_aborted());
        assert!(controller.signal().is_cancelled());
        assert!(!caller.is_cancelled());
    }

    #[test]
    fn caller_cancellation_reaches_attempt_signal() {
        let caller = CancellationToken::new();
        let controller = AttemptController::new(Some(&caller));
        caller.cancel();
        assert!(controller.signal().is_cancelled());
        assert!(!controller.is_aborted());
    }

    #[test]
    fn dropping_controller_cancels_attempt_token() {
        let controller = AttemptController::new(None);
        let signal = controller.signal().clone();
        assert!(!signal.is_cancelled());
        drop(controller);
        assert!(signal.is_cancelled());
    }
}
