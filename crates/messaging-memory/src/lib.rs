//! In-memory implementation of the messaging transport.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Transports own the physical link to a broker.
pub mod transport;

pub use transport::{MemorySubscriber, MemoryTransport, MemoryTransportOptions};
