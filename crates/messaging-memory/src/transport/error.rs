use quill_messaging::transport::TransportError;
use thiserror::Error;

/// An error that can occur when working with the in-memory transport.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The topic channel was closed while subscribing.
    #[error("topic channel closed")]
    ChannelClosed,
}

impl TransportError for Error {}
