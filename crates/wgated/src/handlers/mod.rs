//! Handlers compiled into the daemon.

mod ping;

use crate::dispatch::{HandlerDescriptor, JobFactory, ParamSpec, Privilege, Registry};

pub use self::ping::PingJob;

/// Request name answered by [`PingJob`].
pub const PING_REQUEST: &str = "Ping";

/// Registry holding every built-in handler.
#[must_use]
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(
        HandlerDescriptor::new(PING_REQUEST, Privilege::Session, JobFactory::new(|| PingJob))
            .with_param(ParamSpec::optional(ping::ECHO_PARAM)),
    );
    registry
}
