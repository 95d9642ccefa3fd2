//! Request gateway daemon.
//!
//! `wgated` accepts framed requests over a socket, routes each one to the
//! handler registered under its name and answers with a response tagged with
//! the request's correlation id. Responses are written as units of work
//! complete, so callers must match them by id rather than by order.
//!
//! The bootstrap sequence loads [`wgate_config::Config`], installs structured
//! telemetry, prepares the socket directory and sizes the process-wide
//! [`wgate_sql::BufferPool`] before the listener is bound. Handlers that issue
//! queries build them with [`wgate_sql::SqlAccess`] and report failures as
//! [`JobError`]s, which the dispatcher turns into error documents.

mod bootstrap;
pub mod dispatch;
pub mod handlers;
mod health;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, BoundDaemon, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use dispatch::{
    CorrelationId, DispatchError, Dispatcher, Job, JobContext, JobError, JobFactory, Privilege,
    Registry, ResultCode,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ListenerError, ListenerErrorKind, ListenerHandle, SocketListener};

#[cfg(test)]
mod tests;
