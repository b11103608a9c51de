use crate::error::{Error, Result};
use crate::registry::{CorrelationRegistry, PendingGuard};
use crate::router;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use quill_messaging::transport::Transport;
use quill_messaging::{Envelope, topic};
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use uuid::Uuid;

/// Options for the request client.
#[derive(Clone, Debug)]
pub struct RpcClientOptions {
    /// Deadline applied by [`RpcClient::send_default`].
    pub default_timeout: Duration,
}

impl Default for RpcClientOptions {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
        }
    }
}

/// A client that sends correlated requests and fire-and-forget events.
///
/// All reply topics are subscribed during construction, before any request
/// can be issued, so a fast responder can never beat the client's own reply
/// subscription. Subscription failure here is an unrecoverable startup error.
#[derive(Clone, Debug)]
pub struct RpcClient<T>
where
    T: Transport,
{
    options: RpcClientOptions,
    patterns: Arc<HashSet<String>>,
    registry: CorrelationRegistry,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
    transport: T,
}

impl<T> RpcClient<T>
where
    T: Transport,
{
    /// Creates a new client able to `send` on the given patterns.
    ///
    /// # Errors
    /// Returns an error if a pattern name is invalid or a reply-topic
    /// subscription fails.
    pub async fn new<I, P>(transport: T, patterns: I, options: RpcClientOptions) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let registry = CorrelationRegistry::new();
        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        let mut subscribed = HashSet::new();
        for pattern in patterns {
            let pattern: String = pattern.into();
            if let Err(source) = topic::validate_pattern(&pattern) {
                // Routers spawned for earlier patterns must not outlive
                // a failed constructor.
                shutdown_token.cancel();
                return Err(Error::InvalidPattern { pattern, source });
            }
            if !subscribed.insert(pattern.clone()) {
                continue;
            }

            let reply_topic = topic::reply_topic(&pattern);
            let subscriber = match transport.subscribe(&reply_topic).await {
                Ok(subscriber) => subscriber,
                Err(error) => {
                    shutdown_token.cancel();
                    return Err(Error::transport(error));
                }
            };

            router::spawn_reply_router(
                reply_topic,
                subscriber,
                registry.clone(),
                shutdown_token.clone(),
                &task_tracker,
            );
        }
        task_tracker.close();

        Ok(Self {
            options,
            patterns: Arc::new(subscribed),
            registry,
            shutdown_token,
            task_tracker,
            transport,
        })
    }

    /// Sends a request and awaits its correlated reply.
    ///
    /// The call always reaches a definite outcome: the reply payload, a
    /// [`Error::Remote`] if the responder failed, or a [`Error::Timeout`] if
    /// no reply arrived in time. Dropping the returned future before
    /// resolution deregisters the request without publishing anything.
    ///
    /// # Errors
    /// Also fails fast with [`Error::Transport`] if the publish itself
    /// fails, and [`Error::UnboundPattern`] if the pattern was not named at
    /// construction (no reply subscription exists, so the call could only
    /// ever time out).
    pub async fn send(&self, pattern: &str, payload: Value, deadline: Duration) -> Result<Value> {
        if !self.patterns.contains(pattern) {
            return Err(Error::UnboundPattern(pattern.to_string()));
        }

        let correlation_id = Uuid::new_v4().to_string();
        let receiver = self.registry.register(&correlation_id)?;
        let _guard = PendingGuard::new(&self.registry, &correlation_id);

        let envelope = Envelope::request(pattern, correlation_id.clone(), payload);
        let bytes = envelope.to_bytes()?;

        if let Err(error) = self.transport.publish(pattern, bytes).await {
            // Reject immediately rather than waiting out the deadline; the
            // guard removes the pending entry.
            return Err(Error::transport(error));
        }

        match timeout(deadline, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_closed)) => Err(Error::ChannelClosed),
            Err(_elapsed) => {
                debug!(%pattern, %correlation_id, "request expired without a reply");
                Err(Error::Timeout(deadline))
            }
        }
    }

    /// Sends a request using the configured default deadline.
    ///
    /// # Errors
    /// See [`RpcClient::send`].
    pub async fn send_default(&self, pattern: &str, payload: Value) -> Result<Value> {
        self.send(pattern, payload, self.options.default_timeout)
            .await
    }

    /// Publishes a fire-and-forget event. No reply is expected or awaited
    /// and no registry entry is created.
    ///
    /// # Errors
    /// Returns an error if the pattern name is invalid or the publish fails.
    pub async fn emit(&self, pattern: &str, payload: Value) -> Result<()> {
        topic::validate_pattern(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let bytes = Envelope::event(pattern, payload).to_bytes()?;
        self.transport
            .publish(pattern, bytes)
            .await
            .map_err(Error::transport)
    }

    /// The number of requests currently awaiting a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.registry.pending_count()
    }

    /// Stops the reply routing loops and waits for them to exit.
    pub async fn shutdown(&self) {
        debug!("shutting down rpc client");
        self.shutdown_token.cancel();
        self.task_tracker.wait().await;
    }
}
