//! Abstract interface for correlated messaging over pub/sub transports.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Envelopes are the wire unit exchanged over transports.
pub mod envelope;

/// Pattern handlers process decoded request payloads for responders.
pub mod handler;

/// Topic naming rules shared by requesters and responders.
pub mod topic;

/// Transports own the physical link to a broker.
pub mod transport;

pub use envelope::Envelope;
pub use handler::{FnHandler, HandlerError, PatternHandler, handler_fn};
pub use transport::{Transport, TransportError};
