use crate::error::{Error, Result};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

type Slot = oneshot::Sender<Result<Value>>;

/// Tracks outstanding requests by correlation id.
///
/// The registry is the only structure mutated by more than one concurrent
/// actor: the request client registers entries and the response router
/// completes them. Every operation removes-then-completes under one lock, so
/// a resolve and an expiry racing for the same id produce exactly one winner
/// and the loser's result is harmlessly discarded.
#[derive(Clone, Default)]
pub struct CorrelationRegistry {
    pending: Arc<Mutex<HashMap<String, Slot>>>,
}

impl CorrelationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh correlation id and returns the receiver its
    /// resolution will arrive on.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateCorrelation`] if the id is already
    /// outstanding. Ids are UUIDs, so this indicates a generation bug rather
    /// than a recoverable condition.
    pub fn register(&self, correlation_id: &str) -> Result<oneshot::Receiver<Result<Value>>> {
        let (sender, receiver) = oneshot::channel();

        let mut pending = self.pending.lock();
        if pending.contains_key(correlation_id) {
            return Err(Error::DuplicateCorrelation(correlation_id.to_string()));
        }
        pending.insert(correlation_id.to_string(), sender);

        Ok(receiver)
    }

    /// Completes the pending entry successfully and removes it.
    ///
    /// Returns `false` for a late or duplicate reply whose entry is gone.
    pub fn resolve(&self, correlation_id: &str, payload: Value) -> bool {
        self.complete(correlation_id, Ok(payload))
    }

    /// Completes the pending entry with an error and removes it.
    ///
    /// Returns `false` if the entry is gone.
    pub fn reject(&self, correlation_id: &str, error: Error) -> bool {
        self.complete(correlation_id, Err(error))
    }

    /// Removes the pending entry without completing it.
    ///
    /// Used for expiry and caller cancellation; both are local-only and
    /// publish nothing. Returns `false` if the entry was already resolved.
    pub fn cancel(&self, correlation_id: &str) -> bool {
        self.pending.lock().remove(correlation_id).is_some()
    }

    /// The number of outstanding requests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn complete(&self, correlation_id: &str, outcome: Result<Value>) -> bool {
        let slot = self.pending.lock().remove(correlation_id);
        match slot {
            // The receiver may have been dropped by a cancelled caller;
            // the outcome is discarded either way.
            Some(sender) => {
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationRegistry")
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Deregisters a pending entry when dropped.
///
/// Guards a `send` call so that cancellation (the caller dropping the future
/// before resolution) cannot leak a registry entry.
pub(crate) struct PendingGuard<'a> {
    registry: &'a CorrelationRegistry,
    correlation_id: &'a str,
}

impl<'a> PendingGuard<'a> {
    pub(crate) const fn new(registry: &'a CorrelationRegistry, correlation_id: &'a str) -> Self {
        Self {
            registry,
            correlation_id,
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.registry.cancel(self.correlation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_resolve_removes_entry() {
        let registry = CorrelationRegistry::new();
        let receiver = registry.register("c-1").unwrap();

        assert_eq!(registry.pending_count(), 1);
        assert!(registry.resolve("c-1", json!({ "ok": true })));
        assert_eq!(registry.pending_count(), 0);

        assert_eq!(receiver.await.unwrap().unwrap(), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_reject_surfaces_error() {
        let registry = CorrelationRegistry::new();
        let receiver = registry.register("c-2").unwrap();

        assert!(registry.reject(
            "c-2",
            Error::Remote {
                message: "boom".to_string()
            }
        ));

        let outcome = receiver.await.unwrap();
        assert!(matches!(outcome, Err(Error::Remote { message }) if message == "boom"));
    }

    #[test]
    fn test_duplicate_registration_is_fatal() {
        let registry = CorrelationRegistry::new();
        let _receiver = registry.register("c-3").unwrap();

        assert!(matches!(
            registry.register("c-3"),
            Err(Error::DuplicateCorrelation(id)) if id == "c-3"
        ));
    }

    #[test]
    fn test_resolve_unknown_id_is_discarded() {
        let registry = CorrelationRegistry::new();
        assert!(!registry.resolve("never-registered", json!(null)));
        assert!(!registry.reject(
            "never-registered",
            Error::Remote {
                message: "late".to_string()
            }
        ));
    }

    #[test]
    fn test_cancel_then_resolve_is_noop() {
        let registry = CorrelationRegistry::new();
        let _receiver = registry.register("c-4").unwrap();

        assert!(registry.cancel("c-4"));
        assert!(!registry.resolve("c-4", json!(42)));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_id_reusable_after_resolution() {
        let registry = CorrelationRegistry::new();
        let _first = registry.register("c-5").unwrap();
        assert!(registry.cancel("c-5"));

        assert!(registry.register("c-5").is_ok());
    }

    #[tokio::test]
    async fn test_racing_resolve_and_cancel_have_one_winner() {
        for _ in 0..100 {
            let registry = CorrelationRegistry::new();
            let _receiver = registry.register("c-race").unwrap();

            let resolver = {
                let registry = registry.clone();
                tokio::spawn(async move { registry.resolve("c-race", json!(1)) })
            };
            let canceller = {
                let registry = registry.clone();
                tokio::spawn(async move { registry.cancel("c-race") })
            };

            let resolved = resolver.await.unwrap();
            let cancelled = canceller.await.unwrap();

            assert!(resolved ^ cancelled, "exactly one actor must win the race");
            assert_eq!(registry.pending_count(), 0);
        }
    }

    #[tokio::test]
    async fn test_guard_deregisters_on_drop() {
        let registry = CorrelationRegistry::new();
        let _receiver = registry.register("c-6").unwrap();

        {
            let _guard = PendingGuard::new(&registry, "c-6");
        }

        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_guard_is_noop_after_resolution() {
        let registry = CorrelationRegistry::new();
        let receiver = registry.register("c-7").unwrap();

        {
            let _guard = PendingGuard::new(&registry, "c-7");
            assert!(registry.resolve("c-7", json!("done")));
        }

        assert_eq!(receiver.await.unwrap().unwrap(), json!("done"));
    }
}
