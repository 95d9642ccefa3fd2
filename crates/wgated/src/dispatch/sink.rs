//! Destinations for outbound responses.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::mpsc::UnboundedSender;

use super::message::OutboundMessage;

/// The response could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response channel for {target} is closed")]
pub struct SinkError {
    target: String,
}

impl SinkError {
    /// Creates an error for the given originator.
    pub fn closed(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

/// Accepts responses in completion order.
pub trait ResponseSink: Send + Sync {
    /// Delivers one response.
    fn send(&self, message: OutboundMessage) -> Result<(), SinkError>;
}

/// A response waiting for the connection writer.
///
/// When the request held an in-flight slot, the slot travels with the
/// response and is released once the writer drops it.
#[derive(Debug)]
pub struct QueuedResponse {
    message: OutboundMessage,
    slot: Option<OwnedSemaphorePermit>,
}

impl QueuedResponse {
    /// The response to write.
    #[must_use]
    pub fn message(&self) -> &OutboundMessage {
        &self.message
    }

    /// Whether this response still occupies an in-flight slot.
    #[must_use]
    pub fn holds_slot(&self) -> bool {
        self.slot.is_some()
    }

    /// Consumes the entry, releasing its slot.
    #[must_use]
    pub fn into_message(self) -> OutboundMessage {
        self.message
    }
}

/// Sink that forwards responses to a per-connection writer task.
#[derive(Debug)]
pub struct ChannelSink {
    sender: UnboundedSender<QueuedResponse>,
    slot: Mutex<Option<OwnedSemaphorePermit>>,
}

impl ChannelSink {
    /// Wraps the sending half of a connection's response channel.
    #[must_use]
    pub fn new(sender: UnboundedSender<QueuedResponse>) -> Self {
        Self {
            sender,
            slot: Mutex::new(None),
        }
    }

    /// Wraps the channel for a single request that occupies `slot`.
    ///
    /// The slot is handed to the first response sent and stays held until
    /// the writer has finished with it. Dropping the sink unanswered frees it.
    #[must_use]
    pub fn holding(sender: UnboundedSender<QueuedResponse>, slot: OwnedSemaphorePermit) -> Self {
        Self {
            sender,
            slot: Mutex::new(Some(slot)),
        }
    }
}

impl ResponseSink for ChannelSink {
    fn send(&self, message: OutboundMessage) -> Result<(), SinkError> {
        let slot = self.slot.lock().take();
        self.sender
            .send(QueuedResponse { message, slot })
            .map_err(|error| SinkError::closed(error.0.message.target))
    }
}
