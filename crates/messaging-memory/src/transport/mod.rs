mod error;

pub use error::Error;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use quill_messaging::transport::Transport;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

/// Options for the in-memory transport.
#[derive(Clone, Debug)]
pub struct MemoryTransportOptions {
    /// Messages buffered per topic before slow subscribers start lagging.
    pub channel_capacity: usize,
}

impl Default for MemoryTransportOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
        }
    }
}

/// An in-process broker backed by one broadcast channel per topic.
///
/// Each instance owns its own topic table, so independent transports are
/// fully isolated from each other. Cloning shares the table, which is how
/// requesters and responders in the same process see each other.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    channel_capacity: usize,
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Bytes>>>>,
}

impl MemoryTransport {
    /// Creates a new in-memory transport.
    #[must_use]
    pub fn new(options: MemoryTransportOptions) -> Self {
        Self {
            channel_capacity: options.channel_capacity,
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new(MemoryTransportOptions::default())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Error = Error;

    type Subscriber = MemorySubscriber;

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Self::Error> {
        let sender = {
            let topics = self.topics.lock();
            topics.get(topic).cloned()
        };

        // Publishing to a topic nobody subscribes to succeeds and the
        // message is dropped, matching broker semantics.
        if let Some(sender) = sender {
            let _ = sender.send(payload);
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Self::Subscriber, Self::Error> {
        let receiver = {
            let mut topics = self.topics.lock();
            topics
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
                .subscribe()
        };

        Ok(MemorySubscriber {
            topic: topic.to_string(),
            inner: BroadcastStream::new(receiver),
        })
    }
}

/// A stream of raw messages for one in-memory topic.
#[derive(Debug)]
pub struct MemorySubscriber {
    topic: String,
    inner: BroadcastStream<Bytes>,
}

impl Stream for MemorySubscriber {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(payload))) => return Poll::Ready(Some(payload)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    warn!(topic = %self.topic, missed, "subscriber lagged, messages dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
