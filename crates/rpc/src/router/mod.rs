use crate::error::Error;
use crate::registry::CorrelationRegistry;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use quill_messaging::Envelope;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Spawns the long-lived loop that routes one reply topic into the registry.
///
/// The loop never blocks on a single entry: each reply is a non-blocking map
/// update, so out-of-order arrivals are handled independently. Malformed
/// envelopes are logged and dropped, never fatal to the loop.
pub(crate) fn spawn_reply_router<S>(
    topic: String,
    mut subscriber: S,
    registry: CorrelationRegistry,
    shutdown_token: CancellationToken,
    task_tracker: &TaskTracker,
) where
    S: Stream<Item = Bytes> + Send + Unpin + 'static,
{
    task_tracker.spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = shutdown_token.cancelled() => {
                    debug!(%topic, "shutdown token cancelled, exiting reply routing loop");
                    break;
                }
                message = subscriber.next() => {
                    match message {
                        Some(bytes) => route_reply(&topic, &bytes, &registry),
                        None => {
                            debug!(%topic, "reply stream ended, exiting reply routing loop");
                            break;
                        }
                    }
                }
            }
        }
    });
}

/// Decodes a single reply and dispatches it to the registry.
pub(crate) fn route_reply(topic: &str, bytes: &Bytes, registry: &CorrelationRegistry) {
    let envelope = match Envelope::from_bytes(bytes) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(%topic, %error, "dropping malformed reply");
            return;
        }
    };

    let Some(correlation_id) = envelope.correlation_id else {
        warn!(%topic, pattern = %envelope.pattern, "dropping reply without correlation id");
        return;
    };

    let delivered = if envelope.is_error {
        let message = envelope
            .payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("remote handler failed")
            .to_string();
        registry.reject(&correlation_id, Error::Remote { message })
    } else {
        registry.resolve(&correlation_id, envelope.payload)
    };

    if !delivered {
        debug!(%topic, %correlation_id, "discarding late or duplicate reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_success_reply_resolves_entry() {
        let registry = CorrelationRegistry::new();
        let receiver = registry.register("c-1").unwrap();

        let request = Envelope::request("auth.verify-token", "c-1".to_string(), json!({}));
        let reply = Envelope::reply(&request, json!({ "sub": "u1" }));

        route_reply(
            "auth.verify-token.reply",
            &reply.to_bytes().unwrap(),
            &registry,
        );

        assert_eq!(receiver.await.unwrap().unwrap(), json!({ "sub": "u1" }));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_reply_rejects_with_remote_error() {
        let registry = CorrelationRegistry::new();
        let receiver = registry.register("c-2").unwrap();

        let request = Envelope::request("auth.verify-token", "c-2".to_string(), json!({}));
        let reply = Envelope::error_reply(&request, "token expired");

        route_reply(
            "auth.verify-token.reply",
            &reply.to_bytes().unwrap(),
            &registry,
        );

        let outcome = receiver.await.unwrap();
        assert!(matches!(
            outcome,
            Err(Error::Remote { message }) if message == "token expired"
        ));
    }

    #[test]
    fn test_malformed_reply_is_dropped() {
        let registry = CorrelationRegistry::new();
        let _receiver = registry.register("c-3").unwrap();

        route_reply(
            "auth.verify-token.reply",
            &Bytes::from_static(b"{{{ not json"),
            &registry,
        );

        // The pending entry is untouched.
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_reply_without_correlation_id_is_dropped() {
        let registry = CorrelationRegistry::new();
        let _receiver = registry.register("c-4").unwrap();

        let reply = Envelope::event("auth.verify-token", json!({ "sub": "u1" }));
        route_reply(
            "auth.verify-token.reply",
            &reply.to_bytes().unwrap(),
            &registry,
        );

        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_unknown_correlation_id_is_discarded() {
        let registry = CorrelationRegistry::new();

        let request = Envelope::request("auth.verify-token", "c-gone".to_string(), json!({}));
        let reply = Envelope::reply(&request, json!({ "sub": "u1" }));

        // Must not panic or create an entry.
        route_reply(
            "auth.verify-token.reply",
            &reply.to_bytes().unwrap(),
            &registry,
        );
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_error_reply_without_message_gets_fallback() {
        let registry = CorrelationRegistry::new();
        let receiver = registry.register("c-5").unwrap();

        let reply = Envelope {
            pattern: "auth.verify-token".to_string(),
            correlation_id: Some("c-5".to_string()),
            payload: json!(null),
            reply_topic: None,
            is_error: true,
        };
        route_reply(
            "auth.verify-token.reply",
            &reply.to_bytes().unwrap(),
            &registry,
        );

        let outcome = receiver.blocking_recv().unwrap();
        assert!(matches!(
            outcome,
            Err(Error::Remote { message }) if message == "remote handler failed"
        ));
    }
}
