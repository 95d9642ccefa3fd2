//! Response sink that keeps everything it is given.

use std::sync::Mutex;

use serde_json::Value;

use crate::dispatch::{OutboundMessage, ResponseSink, SinkError};

/// Records responses in the order they are sent.
#[derive(Debug, Default)]
pub struct RecordingSink {
    responses: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    /// Snapshot of the recorded responses.
    pub fn responses(&self) -> Vec<OutboundMessage> {
        self.responses
            .lock()
            .expect("sink mutex poisoned")
            .clone()
    }

    /// Decodes the payload of the response at `index` as JSON.
    pub fn payload(&self, index: usize) -> Option<Value> {
        let responses = self.responses.lock().expect("sink mutex poisoned");
        let response = responses.get(index)?;
        serde_json::from_slice(&response.payload).ok()
    }
}

impl ResponseSink for RecordingSink {
    fn send(&self, message: OutboundMessage) -> Result<(), SinkError> {
        self.responses
            .lock()
            .expect("sink mutex poisoned")
            .push(message);
        Ok(())
    }
}
