use crate::topic;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An error that can occur when encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum Error {
    /// The envelope could not be serialized to JSON.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    /// The payload could not be deserialized from JSON.
    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
}

/// The wire unit exchanged over a transport.
///
/// Envelopes are JSON maps with camelCase field names. Readers ignore unknown
/// fields, so new fields can be added without breaking older peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Logical operation name, e.g. `"auth.verify-token"`.
    pub pattern: String,

    /// Opaque token linking a request to its reply. Absent for events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Request arguments or reply body.
    #[serde(default)]
    pub payload: Value,

    /// Topic the responder must publish the reply to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_topic: Option<String>,

    /// Distinguishes a propagated failure from a success payload.
    #[serde(default)]
    pub is_error: bool,
}

impl Envelope {
    /// Creates a request envelope expecting a correlated reply.
    #[must_use]
    pub fn request(pattern: &str, correlation_id: String, payload: Value) -> Self {
        Self {
            pattern: pattern.to_string(),
            correlation_id: Some(correlation_id),
            payload,
            reply_topic: Some(topic::reply_topic(pattern)),
            is_error: false,
        }
    }

    /// Creates a fire-and-forget event envelope. No reply is expected.
    #[must_use]
    pub fn event(pattern: &str, payload: Value) -> Self {
        Self {
            pattern: pattern.to_string(),
            correlation_id: None,
            payload,
            reply_topic: None,
            is_error: false,
        }
    }

    /// Creates a success reply to a request envelope.
    #[must_use]
    pub fn reply(request: &Self, payload: Value) -> Self {
        Self {
            pattern: request.pattern.clone(),
            correlation_id: request.correlation_id.clone(),
            payload,
            reply_topic: None,
            is_error: false,
        }
    }

    /// Creates an error reply carrying the responder's failure description.
    #[must_use]
    pub fn error_reply(request: &Self, message: &str) -> Self {
        Self {
            pattern: request.pattern.clone(),
            correlation_id: request.correlation_id.clone(),
            payload: serde_json::json!({ "message": message }),
            reply_topic: None,
            is_error: true,
        }
    }

    /// Encodes the envelope for the wire.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        serde_json::to_vec(self).map(Bytes::from).map_err(Error::Encode)
    }

    /// Decodes an envelope from the wire.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid envelope.
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(Error::Decode)
    }
}
