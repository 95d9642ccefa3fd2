//! Structured key/value documents and the codec that frames them.
//!
//! Request bodies and response payloads travel as encoded documents. The
//! dispatcher only depends on [`DocumentCodec`], so the encoding can be
//! swapped without touching routing.

use serde_json::{Map, Value};
use thiserror::Error;

use super::result_code::ResultCode;

/// Hierarchical key/value payload.
pub type Document = Map<String, Value>;

/// Key holding the result code of a response document.
pub const SUCCESS_KEY: &str = "success";

/// Key holding the human-readable message of an error document.
pub const ERROR_KEY: &str = "error";

/// Errors raised while encoding or decoding documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Bytes did not form a valid document.
    #[error("malformed document: {message}")]
    Decode {
        /// Decoder diagnostic.
        message: String,
    },
    /// A document could not be encoded.
    #[error("unencodable document: {message}")]
    Encode {
        /// Encoder diagnostic.
        message: String,
    },
}

impl CodecError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}

/// Converts documents to and from their binary form.
pub trait DocumentCodec: Send + Sync {
    /// Encodes `document`.
    fn encode(&self, document: &Document) -> Result<Vec<u8>, CodecError>;

    /// Decodes `bytes`; an empty input is an empty document.
    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError>;
}

/// Codec that stores documents as JSON objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn encode(&self, document: &Document) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(document).map_err(|error| CodecError::encode(error.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        if bytes.is_empty() {
            return Ok(Document::new());
        }
        serde_json::from_slice(bytes).map_err(|error| CodecError::decode(error.to_string()))
    }
}

/// Builds the `{ "error": .., "success": .. }` payload.
#[must_use]
pub fn error_document(message: impl Into<String>, code: ResultCode) -> Document {
    let mut document = Document::new();
    document.insert(ERROR_KEY.to_owned(), Value::String(message.into()));
    document.insert(SUCCESS_KEY.to_owned(), code.into());
    document
}

/// Reads the result code stored under [`SUCCESS_KEY`].
#[must_use]
pub fn result_code(document: &Document) -> Option<ResultCode> {
    document
        .get(SUCCESS_KEY)
        .and_then(Value::as_i64)
        .and_then(ResultCode::from_code)
}
