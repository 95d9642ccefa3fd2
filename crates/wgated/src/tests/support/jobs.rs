//! Units of work and codecs with scripted behaviour.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::dispatch::{
    CodecError, CorrelationId, Document, DocumentCodec, InboundMessage, Job, JobContext, JobError,
    JobFactory, JsonCodec, Privilege,
};

/// Builds a request whose body is `body` encoded as JSON.
///
/// `Value::Null` produces an empty body.
pub fn request(id: u64, name: &str, privilege: Privilege, body: Value) -> InboundMessage {
    let body = if body.is_null() {
        Vec::new()
    } else {
        serde_json::to_vec(&body).expect("test body encodes")
    };
    InboundMessage::request(CorrelationId::new(id), name, privilege, body)
}

/// Factory wrapper that counts how many jobs it created.
#[derive(Debug, Clone, Default)]
pub struct SpyFactory {
    calls: Arc<AtomicUsize>,
}

impl SpyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs created so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Factory producing counted [`EchoJob`]s.
    pub fn factory(&self) -> JobFactory {
        let calls = Arc::clone(&self.calls);
        JobFactory::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            EchoJob
        })
    }
}

/// Answers with the decoded request document.
pub struct EchoJob;

#[async_trait]
impl Job for EchoJob {
    async fn start(self: Box<Self>, context: JobContext) -> Result<Document, JobError> {
        Ok(context.params().clone())
    }
}

/// Fails with a fixed error.
pub struct FailingJob {
    error: JobError,
}

impl FailingJob {
    pub fn new(error: JobError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl Job for FailingJob {
    async fn start(self: Box<Self>, _context: JobContext) -> Result<Document, JobError> {
        Err(self.error)
    }
}

/// Never completes.
pub struct PendingJob;

#[async_trait]
impl Job for PendingJob {
    async fn start(self: Box<Self>, _context: JobContext) -> Result<Document, JobError> {
        std::future::pending::<()>().await;
        Ok(Document::new())
    }
}

/// Completes once its gate is released, or at once without a gate.
pub struct WaitingJob {
    gate: Option<oneshot::Receiver<()>>,
}

impl WaitingJob {
    pub fn new(gate: Option<oneshot::Receiver<()>>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Job for WaitingJob {
    async fn start(self: Box<Self>, _context: JobContext) -> Result<Document, JobError> {
        if let Some(gate) = self.gate {
            gate.await
                .map_err(|_| JobError::failed("gate dropped before release"))?;
        }
        Ok(Document::new())
    }
}

/// Decodes JSON but refuses to encode anything.
pub struct UnencodableCodec;

impl DocumentCodec for UnencodableCodec {
    fn encode(&self, _document: &Document) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::encode("value cannot be represented"))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Document, CodecError> {
        JsonCodec.decode(bytes)
    }
}
