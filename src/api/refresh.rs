use std::sync::{Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};

/// Why a refresh did not produce a new access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshFailure {
    MissingToken,
    Rejected(u16),
    Transport(String),
    BadBody(String),
    Persist(String),
    /// The session was cleared or replaced while the refresh ran.
    Superseded,
}

impl RefreshFailure {
    pub(crate) fn reason(&self) -> String {
        match self {
            RefreshFailure::MissingToken => "no refresh token stored".to_string(),
            RefreshFailure::Rejected(status) => format!("refresh rejected with status {}", status),
            RefreshFailure::Transport(msg) => format!("transport: {}", msg),
            RefreshFailure::BadBody(msg) => format!("bad body: {}", msg),
            RefreshFailure::Persist(msg) => format!("could not store new token: {}", msg),
            RefreshFailure::Superseded => "session changed during refresh".to_string(),
        }
    }
}

pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Holds at most one refresh in flight. Callers arriving while it runs await
/// the same future instead of starting their own.
///
/// Only a weak handle is kept: the refresh and its result live as long as
/// some caller is awaiting them and no longer.
#[derive(Default)]
pub(crate) struct RefreshGate {
    in_flight: Mutex<Option<WeakShared<BoxFuture<'static, RefreshOutcome>>>>,
}

impl RefreshGate {
    /// Join the running refresh, or start one with `start`. The returned
    /// flag is true for the caller that started it.
    pub(crate) fn join_or_start<F>(&self, start: F) -> (InFlight, bool)
    where
        F: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = slot.as_ref().and_then(WeakShared::upgrade) {
            if running.peek().is_none() {
                return (running, false);
            }
        }
        let fut = start().shared();
        *slot = fut.downgrade();
        (fut, true)
    }

    #[cfg(test)]
    fn is_holding(&self) -> bool {
        let slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().and_then(WeakShared::upgrade).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let gate = RefreshGate::default();
        let started = Arc::new(AtomicU32::new(0));
        let release = Arc::new(Notify::new());

        let make = || {
            let started = started.clone();
            let release = release.clone();
            move || -> BoxFuture<'static, RefreshOutcome> {
                started.fetch_add(1, Ordering::SeqCst);
                async move {
                    release.notified().await;
                    Ok("fresh".to_string())
                }
                .boxed()
            }
        };

        let (first, first_owner) = gate.join_or_start(make());
        let (second, second_owner) = gate.join_or_start(make());
        assert!(first_owner);
        assert!(!second_owner);

        release.notify_one();
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Ok("fresh".to_string()));
        assert_eq!(b, Ok("fresh".to_string()));
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_refresh_is_not_reused() {
        let gate = RefreshGate::default();
        let (first, _) = gate.join_or_start(|| async { Err(RefreshFailure::MissingToken) }.boxed());
        assert_eq!(first.await, Err(RefreshFailure::MissingToken));

        let (second, owner) = gate.join_or_start(|| async { Ok("next".to_string()) }.boxed());
        assert!(owner);
        assert_eq!(second.await, Ok("next".to_string()));
    }

    #[tokio::test]
    async fn settled_refresh_is_released() {
        let gate = RefreshGate::default();
        let captured = Arc::new(());
        let held = captured.clone();
        let (fut, _) = gate.join_or_start(move || {
            async move {
                let _held = held;
                Ok("fresh".to_string())
            }
            .boxed()
        });
        assert!(gate.is_holding());
        assert_eq!(fut.await, Ok("fresh".to_string()));
        assert!(!gate.is_holding());
        assert_eq!(Arc::strong_count(&captured), 1);
    }

    #[test]
    fn abandoned_refresh_is_released() {
        let gate = RefreshGate::default();
        let captured = Arc::new(());
        let held = captured.clone();
        let (fut, _) = gate.join_or_start(move || {
            async move {
                let _held = held;
                Ok("fresh".to_string())
            }
            .boxed()
        });
        assert_eq!(Arc::strong_count(&captured), 2);
        drop(fut);
        assert!(!gate.is_holding());
        assert_eq!(Arc::strong_count(&captured), 1);
    }
}
