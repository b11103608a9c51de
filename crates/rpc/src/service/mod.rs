use crate::error::{Error, Result};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use quill_messaging::transport::Transport;
use quill_messaging::{Envelope, PatternHandler, topic};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

type Bindings = HashMap<String, Arc<dyn PatternHandler>>;

/// Builds the immutable pattern-to-handler bindings of a responder.
///
/// Bindings are declared once at startup and never change for the process
/// lifetime.
#[derive(Default)]
pub struct RpcServiceBuilder {
    bindings: Bindings,
}

impl RpcServiceBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler to a pattern.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateBinding`] if the pattern is already bound —
    /// two declared patterns must never collide within one process — and
    /// [`Error::InvalidPattern`] if the name violates the topic rules.
    pub fn bind<H>(mut self, pattern: &str, handler: H) -> Result<Self>
    where
        H: PatternHandler,
    {
        topic::validate_pattern(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        if self.bindings.contains_key(pattern) {
            return Err(Error::DuplicateBinding(pattern.to_string()));
        }

        self.bindings.insert(pattern.to_string(), Arc::new(handler));
        Ok(self)
    }

    /// Finalizes the bindings into a service on the given transport.
    #[must_use]
    pub fn build<T>(self, transport: T) -> RpcService<T>
    where
        T: Transport,
    {
        RpcService {
            bindings: Arc::new(self.bindings),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
            transport,
        }
    }
}

impl fmt::Debug for RpcServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcServiceBuilder")
            .field("patterns", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A responder that answers requests on its bound patterns.
///
/// One worker runs per bound pattern; each incoming message is handled on
/// its own task, so handlers for distinct correlation ids run concurrently
/// with no implicit serialization.
pub struct RpcService<T>
where
    T: Transport,
{
    bindings: Arc<Bindings>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
    transport: T,
}

impl<T> Clone for RpcService<T>
where
    T: Transport,
{
    fn clone(&self) -> Self {
        Self {
            bindings: self.bindings.clone(),
            shutdown_token: self.shutdown_token.clone(),
            task_tracker: self.task_tracker.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T> fmt::Debug for RpcService<T>
where
    T: Transport,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcService")
            .field("patterns", &self.bindings.keys().collect::<Vec<_>>())
            .field("transport", &self.transport)
            .finish()
    }
}

impl<T> RpcService<T>
where
    T: Transport,
{
    /// Subscribes every bound pattern and starts the dispatch workers.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyRunning`] on a second start, and a transport
    /// error if any subscription fails — the service cannot serve traffic
    /// without its subscriptions, so this is fatal at startup.
    pub async fn start(&self) -> Result<()> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyRunning);
        }

        for (pattern, handler) in self.bindings.iter() {
            let subscriber = match self.transport.subscribe(pattern).await {
                Ok(subscriber) => subscriber,
                Err(error) => {
                    // Wind down workers already spawned for earlier
                    // patterns; shutdown() and wait() must still complete.
                    self.shutdown_token.cancel();
                    self.task_tracker.close();
                    return Err(Error::transport(error));
                }
            };

            self.task_tracker.spawn(Self::process_messages(
                pattern.clone(),
                subscriber,
                handler.clone(),
                self.transport.clone(),
                self.shutdown_token.clone(),
                self.task_tracker.clone(),
            ));
        }

        self.task_tracker.close();

        Ok(())
    }

    /// Stops the dispatch workers and waits for in-flight handlers.
    pub async fn shutdown(&self) {
        debug!("shutting down rpc service");
        self.shutdown_token.cancel();
        self.task_tracker.wait().await;
    }

    /// Waits for the service to exit.
    pub async fn wait(&self) {
        self.task_tracker.wait().await;
    }

    async fn process_messages(
        pattern: String,
        mut subscriber: T::Subscriber,
        handler: Arc<dyn PatternHandler>,
        transport: T,
        shutdown_token: CancellationToken,
        task_tracker: TaskTracker,
    ) {
        loop {
            tokio::select! {
                biased;
                () = shutdown_token.cancelled() => {
                    debug!(%pattern, "shutdown token cancelled, exiting dispatch loop");
                    break;
                }
                message = subscriber.next() => {
                    match message {
                        Some(bytes) => {
                            let envelope = match Envelope::from_bytes(&bytes) {
                                Ok(envelope) => envelope,
                                Err(decode_error) => {
                                    warn!(%pattern, error = %decode_error, "dropping malformed request");
                                    continue;
                                }
                            };

                            if envelope.pattern != pattern {
                                warn!(
                                    %pattern,
                                    received = %envelope.pattern,
                                    "dropping request for unbound pattern",
                                );
                                continue;
                            }

                            let handler = handler.clone();
                            let transport = transport.clone();
                            let pattern = pattern.clone();
                            task_tracker.spawn(async move {
                                Self::dispatch(&pattern, envelope, handler.as_ref(), &transport)
                                    .await;
                            });
                        }
                        None => {
                            debug!(%pattern, "request stream ended, exiting dispatch loop");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Runs one handler invocation and publishes its reply.
    ///
    /// A handler failure is serialized into an error reply, never swallowed:
    /// the requester either gets the failure description or, if the reply
    /// publish itself fails, times out on its own deadline.
    async fn dispatch(
        pattern: &str,
        envelope: Envelope,
        handler: &dyn PatternHandler,
        transport: &T,
    ) {
        let is_request = envelope.correlation_id.is_some();
        let outcome = handler.handle(envelope.payload.clone()).await;

        if !is_request {
            // Event mode: nothing goes back on the wire.
            if let Err(handler_error) = outcome {
                error!(%pattern, error = %handler_error, "event handler failed");
            }
            return;
        }

        let reply_topic = envelope
            .reply_topic
            .clone()
            .unwrap_or_else(|| topic::reply_topic(pattern));

        let reply = match outcome {
            Ok(payload) => Envelope::reply(&envelope, payload),
            Err(handler_error) => {
                debug!(%pattern, error = %handler_error, "handler failed, replying with error");
                Envelope::error_reply(&envelope, &handler_error.to_string())
            }
        };

        let bytes = match reply.to_bytes() {
            Ok(bytes) => bytes,
            Err(encode_error) => {
                error!(%pattern, error = %encode_error, "failed to encode reply, replying with error");
                match Envelope::error_reply(&envelope, &encode_error.to_string()).to_bytes() {
                    Ok(bytes) => bytes,
                    Err(_) => return,
                }
            }
        };

        if let Err(publish_error) = transport.publish(&reply_topic, bytes).await {
            error!(
                %pattern,
                %reply_topic,
                error = %publish_error,
                "failed to publish reply",
            );
        }
    }
}
