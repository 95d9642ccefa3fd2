//! Units of work started for accepted requests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use wgate_sql::TransactionError;

use super::document::Document;
use super::message::CorrelationId;
use super::privilege::Privilege;
use super::registry::{HandlerDescriptor, ParamSpec};
use super::result_code::ResultCode;

/// Everything a unit of work learns about the request it serves.
///
/// Besides the decoded document, the context carries the fields the handler
/// declared at registration, so a job can tell expected input from extras.
#[derive(Debug, Clone)]
pub struct JobContext {
    correlation_id: CorrelationId,
    request_name: String,
    privilege: Privilege,
    declared: Vec<ParamSpec>,
    deadline: Instant,
    params: Document,
}

impl JobContext {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        descriptor: &HandlerDescriptor,
        deadline: Instant,
        params: Document,
    ) -> Self {
        Self {
            correlation_id,
            request_name: descriptor.request_name().to_owned(),
            privilege: descriptor.required_privilege(),
            declared: descriptor.params().to_vec(),
            deadline,
            params,
        }
    }

    /// Identifier the response will carry.
    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Name the request was routed by.
    #[must_use]
    pub fn request_name(&self) -> &str {
        &self.request_name
    }

    /// Privilege the handler was registered with.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Instant after which the dispatcher abandons the unit of work.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Decoded request fields.
    #[must_use]
    pub fn params(&self) -> &Document {
        &self.params
    }

    /// A single request field.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Fields the handler declared when it was registered.
    #[must_use]
    pub fn declared_params(&self) -> &[ParamSpec] {
        &self.declared
    }

    /// A request field, provided the handler declared it.
    #[must_use]
    pub fn declared_param(&self, name: &str) -> Option<&Value> {
        self.declared
            .iter()
            .any(|spec| spec.name() == name)
            .then(|| self.params.get(name))
            .flatten()
    }

    /// Names of request fields the handler never declared.
    pub fn undeclared_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .keys()
            .map(String::as_str)
            .filter(|name| !self.declared.iter().any(|spec| spec.name() == *name))
    }
}

/// Failure reported by a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct JobError {
    code: ResultCode,
    message: String,
}

impl JobError {
    /// Creates an error with an explicit result code.
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ResultCode::Fail, message)
    }

    /// Creates an invalid-parameter failure.
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::new(ResultCode::InvalidParam, message)
    }

    /// Result code reported to the caller.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        self.code
    }

    /// Human-readable cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TransactionError> for JobError {
    fn from(error: TransactionError) -> Self {
        Self::failed(error.to_string())
    }
}

/// A unit of work bound to one request.
#[async_trait]
pub trait Job: Send {
    /// Runs to completion and yields the response document.
    ///
    /// A missing `success` key is filled in by the dispatcher.
    async fn start(self: Box<Self>, context: JobContext) -> Result<Document, JobError>;
}

/// Constructor for a handler's unit of work.
#[derive(Clone)]
pub struct JobFactory(Arc<dyn Fn() -> Box<dyn Job> + Send + Sync>);

impl JobFactory {
    /// Wraps a constructor closure.
    pub fn new<F, J>(create: F) -> Self
    where
        F: Fn() -> J + Send + Sync + 'static,
        J: Job + 'static,
    {
        Self(Arc::new(move || Box::new(create()) as Box<dyn Job>))
    }

    /// Creates a fresh unit of work.
    #[must_use]
    pub fn create(&self) -> Box<dyn Job> {
        (self.0)()
    }
}

impl fmt::Debug for JobFactory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("JobFactory(..)")
    }
}
