//! Socket listener for the gateway's JSONL transport.
//!
//! The transport binds the configured endpoint and hands every accepted
//! connection to a [`ConnectionHandler`] on its own task.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::{ListenerError, ListenerErrorKind};
pub(crate) use self::handler::{
    ConnectionHandler, ConnectionReader, ConnectionStream, ConnectionWriter,
};
pub use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
