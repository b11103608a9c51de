mod error;

pub use error::Error;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_nats::Client;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use quill_messaging::transport::Transport;

/// Options for the NATS transport.
#[derive(Clone, Debug)]
pub struct NatsTransportOptions {
    /// The NATS client to use.
    pub client: Client,
}

/// A transport backed by core NATS subjects.
///
/// Plain pub/sub only; request persistence is the caller's concern. Topics
/// map one-to-one onto NATS subjects.
#[derive(Clone, Debug)]
pub struct NatsTransport {
    client: Client,
}

impl NatsTransport {
    /// Creates a new NATS transport.
    #[must_use]
    pub fn new(options: NatsTransportOptions) -> Self {
        Self {
            client: options.client,
        }
    }
}

#[async_trait]
impl Transport for NatsTransport {
    type Error = Error;

    type Subscriber = NatsSubscriber;

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), Self::Error> {
        self.client
            .publish(topic.to_string(), payload)
            .await
            .map_err(|_| Error::Publish)?;

        // Requests ride on latency-sensitive round trips, so flush rather
        // than waiting for the client's background interval.
        self.client.flush().await.map_err(|_| Error::Flush)
    }

    async fn subscribe(&self, topic: &str) -> Result<Self::Subscriber, Self::Error> {
        let inner = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|_| Error::Subscribe)?;

        Ok(NatsSubscriber { inner })
    }
}

/// A stream of raw messages for one NATS subject.
#[derive(Debug)]
pub struct NatsSubscriber {
    inner: async_nats::Subscriber,
}

impl Stream for NatsSubscriber {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(message)) => Poll::Ready(Some(message.payload)),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
