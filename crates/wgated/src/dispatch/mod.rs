//! Request routing for the gateway.
//!
//! An [`InboundMessage`] names a request and carries the caller's privilege
//! level. The [`Dispatcher`] looks the name up in a [`Registry`], checks the
//! privilege for an exact match, decodes the request document and starts the
//! handler's [`Job`] on its own task. Whatever happens, exactly one
//! [`OutboundMessage`] tagged with the request's correlation id is handed to
//! the [`ResponseSink`].
//!
//! ## Protocol
//!
//! Over the socket transport each request is one JSON line:
//!
//! ```json
//! {"message_type":"WG_REQUEST","correlation_id":7,"request_name":"Ping","privilege_level":3,"body":"eyJlY2hvIjoiaGkifQ=="}
//! ```
//!
//! and each response is one JSON line, written when its unit of work
//! completes:
//!
//! ```json
//! {"message_type":"WG_RESPONSE","correlation_id":7,"target":"tcp:127.0.0.1:50412","payload":"...","success":true}
//! ```
//!
//! `body` and `payload` are base64-encoded structured documents. Failed
//! requests answer with `{"error": "...", "success": <result code>}`.

mod connection;
mod dispatcher;
mod document;
mod errors;
mod job;
mod message;
mod privilege;
mod registry;
mod result_code;
mod sink;

pub(crate) use self::connection::DispatchConnectionHandler;
pub use self::dispatcher::{DispatchStage, DispatchTicket, Dispatcher};
pub use self::document::{
    CodecError, Document, DocumentCodec, ERROR_KEY, JsonCodec, SUCCESS_KEY, error_document,
    result_code,
};
pub use self::errors::DispatchError;
pub use self::job::{Job, JobContext, JobError, JobFactory};
pub use self::message::{
    CorrelationId, InboundMessage, MessageError, OutboundMessage, REQUEST_MESSAGE_TYPE,
    RESPONSE_MESSAGE_TYPE,
};
pub use self::privilege::{Privilege, PrivilegeLevel};
pub use self::registry::{HandlerDescriptor, ParamSpec, Registry};
pub use self::result_code::ResultCode;
pub use self::sink::{ChannelSink, QueuedResponse, ResponseSink, SinkError};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
