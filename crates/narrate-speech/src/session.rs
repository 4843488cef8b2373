//! Session identity and cooperative cancellation.
//!
//! The coordinator is the single writer of the active session id. Every
//! task doing work for a session holds a [`SessionContext`] and asks it
//! whether it is still current before each effect; a superseded session
//! simply stops producing effects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use narrate_core::SessionId;
use tokio_util::sync::CancellationToken;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Hands out session ids that are unique across every reader in the
/// process and increase with each call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionIds;

impl SessionIds {
    #[must_use]
    pub fn next_id(&self) -> SessionId {
        SessionId::new(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared, read-mostly view of the active session id.
#[derive(Debug, Clone, Default)]
pub struct ActiveSession(Arc<AtomicU64>);

impl ActiveSession {
    #[must_use]
    pub fn current(&self) -> SessionId {
        SessionId::new(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, id: SessionId) {
        self.0.store(id.get(), Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.set(SessionId::NONE);
    }
}

/// The originating session is no longer active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleSession(pub SessionId);

/// Everything a task needs to know whether its work still matters.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: SessionId,
    token: CancellationToken,
    active: ActiveSession,
}

impl SessionContext {
    pub fn new(id: SessionId, active: ActiveSession) -> Self {
        Self {
            id,
            token: CancellationToken::new(),
            active,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Token cancelled when the session is superseded or stopped.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether this session is still the active one.
    #[must_use]
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.active.current() == self.id
    }

    pub fn ensure_current(&self) -> Result<(), StaleSession> {
        if self.is_current() {
            Ok(())
        } else {
            Err(StaleSession(self.id))
        }
    }

    /// Mark the session superseded and wake anything waiting on it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Sleep for `delay` unless the session is cancelled first.
    ///
    /// Returns `false` if the session was cancelled.
    pub async fn sleep(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return self.is_current();
        }
        tokio::select! {
            () = self.token.cancelled() => false,
            () = tokio::time::sleep(delay) => self.is_current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let ids = SessionIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(b > a);
        assert!(!a.is_none());
    }

    #[test]
    fn test_ids_are_shared_across_allocators() {
        let first = SessionIds;
        let second = SessionIds;
        let ids: Vec<SessionId> = (0..4)
            .flat_map(|_| [first.next_id(), second.next_id()])
            .collect();

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_superseded_context_is_stale() {
        let active = ActiveSession::default();
        let first = SessionContext::new(SessionId::new(1), active.clone());
        active.set(first.id());
        assert!(first.is_current());

        let second = SessionContext::new(SessionId::new(2), active.clone());
        active.set(second.id());
        assert!(!first.is_current());
        assert_eq!(first.ensure_current(), Err(StaleSession(SessionId::new(1))));
        assert!(second.is_current());
    }

    #[test]
    fn test_cancel_makes_stale() {
        let active = ActiveSession::default();
        let ctx = SessionContext::new(SessionId::new(1), active.clone());
        active.set(ctx.id());
        ctx.cancel();
        assert!(!ctx.is_current());
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_cancel() {
        let active = ActiveSession::default();
        let ctx = SessionContext::new(SessionId::new(1), active.clone());
        active.set(ctx.id());

        let sleeper = ctx.clone();
        let task = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(30)).await });
        ctx.cancel();

        let completed = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("sleep should end on cancel")
            .unwrap();
        assert!(!completed);
    }
}
