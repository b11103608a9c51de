use quill_messaging::transport::TransportError;
use thiserror::Error;

/// An error that can occur when working with the NATS transport.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Failed to publish to the subject.
    #[error("failed to publish to subject")]
    Publish,

    /// Failed to flush outgoing messages.
    #[error("failed to flush outgoing messages")]
    Flush,

    /// Failed to subscribe to the subject.
    #[error("failed to subscribe to subject")]
    Subscribe,
}

impl TransportError for Error {}
