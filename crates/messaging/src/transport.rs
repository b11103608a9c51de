use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// Marker trait for transport errors
pub trait TransportError: Error + Send + Sync + 'static {}

/// A trait representing a logical connection to a broker.
///
/// Implementations own producer and consumer channels for a single broker and
/// are cheap to clone. Topics are located purely by name; a subscription to a
/// topic must be possible before anything is ever published on it, since
/// requesters subscribe to reply topics ahead of their first request.
#[async_trait]
pub trait Transport
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the transport.
    type Error: TransportError;

    /// The stream of raw messages produced by a subscription.
    type Subscriber: Stream<Item = Bytes> + Send + Unpin + 'static;

    /// Publishes a message to the given topic.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Self::Error>;

    /// Subscribes to the given topic.
    async fn subscribe(&self, topic: &str) -> Result<Self::Subscriber, Self::Error>;
}
