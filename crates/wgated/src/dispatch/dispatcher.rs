//! Routes inbound messages to units of work and answers every one of them.
//!
//! A request moves through `idle -> name_parsed -> privilege_checked ->
//! dispatched -> responded`, or ends early in `rejected`. Both terminal
//! stages send exactly one response tagged with the request's correlation id.

use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, warn};

use super::DISPATCH_TARGET;
use super::document::{Document, DocumentCodec, SUCCESS_KEY, result_code};
use super::errors::DispatchError;
use super::job::{Job, JobContext, JobError};
use super::message::{CorrelationId, InboundMessage, OutboundMessage};
use super::privilege::PrivilegeLevel;
use super::registry::{HandlerDescriptor, Registry};
use super::result_code::ResultCode;
use super::sink::ResponseSink;

/// Progress of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DispatchStage {
    /// The message has been received.
    Idle,
    /// Correlation id and request name have been read.
    NameParsed,
    /// The caller holds the handler's privilege.
    PrivilegeChecked,
    /// The unit of work is running.
    Dispatched,
    /// A response produced by the unit of work was sent.
    Responded,
    /// An error response was sent without starting a unit of work.
    Rejected,
}

/// Where a response goes.
#[derive(Debug, Clone)]
struct Route {
    correlation_id: CorrelationId,
    target: String,
}

/// Handle on a unit of work that has been started.
#[derive(Debug)]
pub struct DispatchTicket {
    correlation_id: CorrelationId,
    task: JoinHandle<()>,
}

impl DispatchTicket {
    /// Correlation id the response will carry.
    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Waits until the response has been handed to the sink.
    ///
    /// # Errors
    ///
    /// Returns the join error if the completion task itself panicked.
    pub async fn finished(self) -> Result<(), JoinError> {
        self.task.await
    }
}

/// Routes requests through a [`Registry`].
pub struct Dispatcher {
    registry: Arc<Registry>,
    codec: Arc<dyn DocumentCodec>,
    request_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher over a fully populated registry.
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        codec: Arc<dyn DocumentCodec>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            codec,
            request_timeout,
        }
    }

    /// Registry requests are routed through.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deadline applied to each unit of work.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Handles one inbound message.
    ///
    /// Rejected requests are answered before this returns and the error is
    /// handed back for the caller's bookkeeping. Accepted requests are
    /// answered from a spawned task once the unit of work completes or its
    /// deadline passes.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the reason the request was rejected. The error response has
    /// already been sent.
    pub fn dispatch(
        &self,
        message: InboundMessage,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<DispatchTicket, DispatchError> {
        debug!(
            target: DISPATCH_TARGET,
            correlation_id = %message.correlation_id,
            stage = %DispatchStage::Idle,
            body_len = message.body.len(),
            "request received"
        );
        let InboundMessage {
            correlation_id,
            source,
            request_name,
            privilege_level,
            body,
            ..
        } = message;
        let route = Route {
            correlation_id,
            target: source,
        };
        log_stage(&route, &request_name, DispatchStage::NameParsed);

        let (descriptor, params) = match self.accept(&route, &request_name, privilege_level, &body)
        {
            Ok(accepted) => accepted,
            Err(rejection) => {
                warn!(
                    target: DISPATCH_TARGET,
                    correlation_id = %route.correlation_id,
                    request = %request_name,
                    code = %rejection.result_code(),
                    error = %rejection,
                    "request rejected"
                );
                respond(
                    self.codec.as_ref(),
                    sink.as_ref(),
                    &route,
                    &rejection.to_document(),
                    false,
                    DispatchStage::Rejected,
                );
                return Err(rejection);
            }
        };

        let job = descriptor.factory().create();
        let deadline = Instant::now() + self.request_timeout;
        let context = JobContext::new(correlation_id, descriptor, deadline, params);
        let undeclared: Vec<&str> = context.undeclared_params().collect();
        if !undeclared.is_empty() {
            debug!(
                target: DISPATCH_TARGET,
                correlation_id = %correlation_id,
                request = %request_name,
                fields = ?undeclared,
                "request carries undeclared fields"
            );
        }
        log_stage(&route, &request_name, DispatchStage::Dispatched);

        let completion = Completion {
            codec: Arc::clone(&self.codec),
            sink,
            route,
            request_name,
            timeout: self.request_timeout,
        };
        let task = tokio::spawn(completion.run(job, context, deadline));
        Ok(DispatchTicket {
            correlation_id,
            task,
        })
    }

    fn accept(
        &self,
        route: &Route,
        request_name: &str,
        privilege_level: PrivilegeLevel,
        body: &[u8],
    ) -> Result<(&HandlerDescriptor, Document), DispatchError> {
        let descriptor = self
            .registry
            .lookup(request_name)
            .ok_or_else(|| DispatchError::unknown_method(request_name))?;

        let required = descriptor.required_privilege();
        if !privilege_level.satisfies(required) {
            return Err(DispatchError::privilege_mismatch(
                request_name,
                required,
                privilege_level,
            ));
        }
        log_stage(route, request_name, DispatchStage::PrivilegeChecked);

        let params = self.codec.decode(body)?;
        if let Some(missing) = descriptor
            .required_params()
            .find(|name| !params.contains_key(*name))
        {
            return Err(DispatchError::missing_parameter(request_name, missing));
        }
        Ok((descriptor, params))
    }
}

/// State carried into the task that waits for a unit of work.
struct Completion {
    codec: Arc<dyn DocumentCodec>,
    sink: Arc<dyn ResponseSink>,
    route: Route,
    request_name: String,
    timeout: Duration,
}

impl Completion {
    async fn run(self, job: Box<dyn Job>, context: JobContext, deadline: Instant) {
        let mut work = tokio::spawn(job.start(context));
        let outcome = match timeout_at(deadline, &mut work).await {
            Ok(Ok(result)) => result.map_err(|source| DispatchError::job(&self.request_name, source)),
            Ok(Err(join_error)) => {
                error!(
                    target: DISPATCH_TARGET,
                    correlation_id = %self.route.correlation_id,
                    request = %self.request_name,
                    error = %join_error,
                    "unit of work aborted"
                );
                Err(DispatchError::job(
                    &self.request_name,
                    JobError::failed("unit of work aborted"),
                ))
            }
            Err(_elapsed) => {
                work.abort();
                Err(DispatchError::timeout(&self.request_name, self.timeout))
            }
        };

        let (document, success) = match outcome {
            Ok(document) => with_default_success(document),
            Err(failure) => {
                warn!(
                    target: DISPATCH_TARGET,
                    correlation_id = %self.route.correlation_id,
                    request = %self.request_name,
                    code = %failure.result_code(),
                    error = %failure,
                    "unit of work failed"
                );
                (failure.to_document(), false)
            }
        };

        respond(
            self.codec.as_ref(),
            self.sink.as_ref(),
            &self.route,
            &document,
            success,
            DispatchStage::Responded,
        );
    }
}

/// Fills in `success = OK` when the unit of work left it out.
fn with_default_success(mut document: Document) -> (Document, bool) {
    document
        .entry(SUCCESS_KEY)
        .or_insert_with(|| ResultCode::Ok.into());
    let success = result_code(&document).is_some_and(ResultCode::is_ok);
    (document, success)
}

fn respond(
    codec: &dyn DocumentCodec,
    sink: &dyn ResponseSink,
    route: &Route,
    document: &Document,
    success: bool,
    stage: DispatchStage,
) {
    let (payload, success) = match codec.encode(document) {
        Ok(payload) => (payload, success),
        Err(encode_error) => {
            error!(
                target: DISPATCH_TARGET,
                correlation_id = %route.correlation_id,
                error = %encode_error,
                "handler produced an unencodable response; sending empty payload"
            );
            (Vec::new(), false)
        }
    };

    let message =
        OutboundMessage::response(route.correlation_id, route.target.as_str(), payload, success);
    if let Err(send_error) = sink.send(message) {
        warn!(
            target: DISPATCH_TARGET,
            correlation_id = %route.correlation_id,
            error = %send_error,
            "response could not be delivered"
        );
    }
    debug!(
        target: DISPATCH_TARGET,
        correlation_id = %route.correlation_id,
        stage = %stage,
        success,
        "response sent"
    );
}

fn log_stage(route: &Route, request_name: &str, stage: DispatchStage) {
    debug!(
        target: DISPATCH_TARGET,
        correlation_id = %route.correlation_id,
        request = %request_name,
        stage = %stage,
        "dispatch stage reached"
    );
}
