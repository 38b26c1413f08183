//! Correlation table for outstanding requests.
//!
//! Maps a request id to the `oneshot` sender its caller is awaiting. The
//! sender is consumed on resolution, so each id completes at most once; a
//! response for an unknown or already-completed id is a no-op, which absorbs
//! duplicate or late delivery from the server.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Result, RpcError};

/// Channel sender completing one pending request.
pub type Completion = oneshot::Sender<Result<Value>>;

/// Table of requests awaiting their correlated responses.
///
/// Shared between the request-issuing path and the inbound dispatch path;
/// both run on real OS threads under tokio, so the map is mutex-guarded.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<u64, Completion>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the completion for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::DuplicateId`] if `id` is already outstanding.
    pub fn register(&self, id: u64, completion: Completion) -> Result<()> {
        let mut entries = self.lock();
        if entries.contains_key(&id) {
            return Err(RpcError::DuplicateId(id));
        }
        entries.insert(id, completion);
        Ok(())
    }

    /// Complete `id` with a successful result.
    ///
    /// Returns `false` if no entry was pending under that id.
    pub fn resolve(&self, id: u64, result: Value) -> bool {
        self.complete(id, Ok(result))
    }

    /// Complete `id` with an error.
    ///
    /// Returns `false` if no entry was pending under that id.
    pub fn reject(&self, id: u64, error: RpcError) -> bool {
        self.complete(id, Err(error))
    }

    /// Remove the entry for `id` without completing it.
    ///
    /// Used by the timeout path: the caller has already given up, so the
    /// eventual response should be dropped as unmatched.
    pub fn remove(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Reject every remaining entry with [`RpcError::ConnectionClosed`] and
    /// clear the table. Called on connection shutdown so no caller future
    /// hangs forever.
    pub fn drain_all(&self) {
        let entries = std::mem::take(&mut *self.lock());
        for (id, completion) in entries {
            tracing::debug!(id, "rejecting pending request on shutdown");
            let _ = completion.send(Err(RpcError::ConnectionClosed));
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check whether no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn complete(&self, id: u64, outcome: Result<Value>) -> bool {
        match self.lock().remove(&id) {
            Some(completion) => {
                // The caller may have stopped waiting; that is its way of
                // cancelling, so a dead receiver is not an error.
                let _ = completion.send(outcome);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Completion>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel() -> (Completion, oneshot::Receiver<Result<Value>>) {
        oneshot::channel()
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let pending = PendingRequests::new();
        let (tx, rx) = channel();

        pending.register(1, tx).unwrap();
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(1, json!({"ok": true})));
        assert!(pending.is_empty());

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_register_duplicate_id_rejected() {
        let pending = PendingRequests::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        pending.register(7, tx1).unwrap();
        let err = pending.register(7, tx2).unwrap_err();
        assert!(matches!(err, RpcError::DuplicateId(7)));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_reject_delivers_error() {
        let pending = PendingRequests::new();
        let (tx, rx) = channel();

        pending.register(3, tx).unwrap();
        assert!(pending.reject(3, RpcError::Server(json!({"code": -1}))));

        match rx.await.unwrap() {
            Err(RpcError::Server(payload)) => assert_eq!(payload["code"], -1),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop() {
        let pending = PendingRequests::new();
        assert!(!pending.resolve(99, json!(null)));
        assert!(!pending.reject(99, RpcError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_second_resolution_is_noop() {
        let pending = PendingRequests::new();
        let (tx, rx) = channel();

        pending.register(4, tx).unwrap();
        assert!(pending.resolve(4, json!(1)));
        assert!(!pending.resolve(4, json!(2)));

        assert_eq!(rx.await.unwrap().unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_resolve_after_caller_gave_up() {
        let pending = PendingRequests::new();
        let (tx, rx) = channel();

        pending.register(5, tx).unwrap();
        drop(rx);

        // Entry existed, delivery target did not; still counts as handled.
        assert!(pending.resolve(5, json!(null)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_drain_all_rejects_everything() {
        let pending = PendingRequests::new();
        let mut receivers = Vec::new();

        for id in 1..=5 {
            let (tx, rx) = channel();
            pending.register(id, tx).unwrap();
            receivers.push(rx);
        }

        pending.drain_all();
        assert!(pending.is_empty());

        for rx in receivers {
            match rx.await.unwrap() {
                Err(RpcError::ConnectionClosed) => {}
                other => panic!("expected ConnectionClosed, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_remove_drops_entry_silently() {
        let pending = PendingRequests::new();
        let (tx, mut rx) = channel();

        pending.register(6, tx).unwrap();
        assert!(pending.remove(6));
        assert!(!pending.remove(6));

        // Sender was dropped without sending.
        assert!(rx.try_recv().is_err());
    }
}
