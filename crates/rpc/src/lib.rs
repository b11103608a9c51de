//! Correlated request/response messaging on top of pub/sub transports.
//!
//! Pub/sub brokers offer no request/response semantics, no ordering across
//! topics, and no delivery linkage between a request and its answer. This
//! crate layers that protocol on top of any [`quill_messaging::Transport`]:
//! a requester publishes an envelope carrying a fresh correlation id and
//! awaits exactly one correlated reply on a deterministically derived reply
//! topic, while a responder binds handlers to patterns and answers every
//! request — success or failure — on that reply topic. Callers always get a
//! definite outcome: a payload, a remote error, or a timeout.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

/// Clients send correlated requests and fire-and-forget events.
pub mod client;

/// The correlation registry tracks outstanding requests.
pub mod registry;

/// The response router feeds reply topics into the registry.
mod router;

/// Services bind handlers to patterns and answer requests.
pub mod service;

pub use client::{RpcClient, RpcClientOptions};
pub use error::{Error, Result};
pub use registry::CorrelationRegistry;
pub use service::{RpcService, RpcServiceBuilder};
