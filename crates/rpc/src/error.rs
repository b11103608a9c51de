//! Error types for correlated request/response messaging.

use std::time::Duration;

use quill_messaging::transport::TransportError;
use thiserror::Error;

/// Result type alias for messaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for requesters and responders.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed to publish or subscribe.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No correlated reply arrived within the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The responder explicitly signaled failure.
    #[error("remote handler failed: {message}")]
    Remote {
        /// The responder's error description.
        message: String,
    },

    /// A correlation id was registered twice. Indicates an id generation bug.
    #[error("correlation id already registered: {0}")]
    DuplicateCorrelation(String),

    /// The same pattern was bound twice within one process.
    #[error("pattern bound twice: {0}")]
    DuplicateBinding(String),

    /// The pattern name violates the topic naming rules.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The naming rule that was violated.
        #[source]
        source: quill_messaging::topic::Error,
    },

    /// The pattern was not registered for replies at client startup.
    #[error("pattern not registered for replies at startup: {0}")]
    UnboundPattern(String),

    /// The envelope could not be encoded or decoded.
    #[error(transparent)]
    Envelope(#[from] quill_messaging::envelope::Error),

    /// The pending-reply channel closed without a resolution.
    #[error("reply channel closed")]
    ChannelClosed,

    /// The service was started twice.
    #[error("already running")]
    AlreadyRunning,
}

impl Error {
    /// Wraps a transport error.
    pub fn transport<E>(error: E) -> Self
    where
        E: TransportError,
    {
        Self::Transport(Box::new(error))
    }
}
