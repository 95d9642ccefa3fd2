//! Request and response envelopes exchanged with the transport.
//!
//! Envelopes are JSON objects, one per line. Document bodies are carried as
//! base64 so the codec stays opaque to the framing.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::privilege::PrivilegeLevel;

/// `message_type` of inbound requests.
pub const REQUEST_MESSAGE_TYPE: &str = "WG_REQUEST";

/// `message_type` of outbound responses.
pub const RESPONSE_MESSAGE_TYPE: &str = "WG_RESPONSE";

/// Opaque identifier pairing a response with its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Errors raised while parsing an inbound envelope.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The line held no content.
    #[error("empty request line")]
    Empty,
    /// The line was not a valid envelope.
    #[error("malformed envelope: {source}")]
    Malformed {
        /// JSON parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The envelope was not a request.
    #[error("unexpected message type '{found}'")]
    UnexpectedType {
        /// The `message_type` that was received.
        found: String,
    },
}

/// A framed request delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Always [`REQUEST_MESSAGE_TYPE`].
    pub message_type: String,
    /// Identifier echoed on the response.
    pub correlation_id: CorrelationId,
    /// Originator the response is addressed to.
    #[serde(default)]
    pub source: String,
    /// Name used to look up the handler.
    pub request_name: String,
    /// Privilege the caller holds.
    pub privilege_level: PrivilegeLevel,
    /// Encoded document of handler-specific fields.
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl InboundMessage {
    /// Builds a request envelope.
    #[must_use]
    pub fn request(
        correlation_id: CorrelationId,
        request_name: impl Into<String>,
        privilege_level: impl Into<PrivilegeLevel>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            message_type: REQUEST_MESSAGE_TYPE.to_owned(),
            correlation_id,
            source: String::new(),
            request_name: request_name.into(),
            privilege_level: privilege_level.into(),
            body,
        }
    }

    /// Sets the originator.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Parses one JSONL line, ignoring trailing whitespace.
    ///
    /// # Errors
    ///
    /// Fails when the line is empty, is not a valid envelope, or is not a
    /// request.
    pub fn parse(line: &[u8]) -> Result<Self, MessageError> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return Err(MessageError::Empty);
        }
        let message: Self =
            serde_json::from_slice(trimmed).map_err(|source| MessageError::Malformed { source })?;
        if message.message_type != REQUEST_MESSAGE_TYPE {
            return Err(MessageError::UnexpectedType {
                found: message.message_type,
            });
        }
        Ok(message)
    }
}

/// A response addressed to the originator of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Always [`RESPONSE_MESSAGE_TYPE`].
    pub message_type: String,
    /// Identifier copied from the request.
    pub correlation_id: CorrelationId,
    /// The request's originator.
    pub target: String,
    /// Encoded response document; empty when encoding failed.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Whether the request succeeded.
    pub success: bool,
}

impl OutboundMessage {
    /// Builds a response envelope.
    #[must_use]
    pub fn response(
        correlation_id: CorrelationId,
        target: impl Into<String>,
        payload: Vec<u8>,
        success: bool,
    ) -> Self {
        Self {
            message_type: RESPONSE_MESSAGE_TYPE.to_owned(),
            correlation_id,
            target: target.into(),
            payload,
            success,
        }
    }

    /// Serialises the envelope as one newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
