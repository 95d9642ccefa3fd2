//! Shared configuration for the request gateway.
//!
//! [`Config`] is resolved by `ortho_config` from, in increasing precedence,
//! built-in defaults, a TOML configuration file, `WGATE_*` environment
//! variables and command-line flags. The daemon derives buffer pool sizing,
//! request deadlines and its listening endpoint from the resolved values.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    default_buffer_initial_capacity, default_buffer_pool_max_bytes, default_max_in_flight_requests,
    default_max_request_bytes, default_request_timeout_ms,
};

pub use crate::defaults::{
    DEFAULT_BUFFER_INITIAL_CAPACITY, DEFAULT_BUFFER_POOL_MAX_BYTES, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_IN_FLIGHT_REQUESTS, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TCP_PORT, default_log_filter,
    default_log_format, default_socket_endpoint,
};
pub use crate::logging::{LogFormat, LogFormatParseError};
pub use crate::socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WGATE")]
pub struct Config {
    /// Endpoint the daemon accepts framed requests on.
    #[serde(default = "default_socket_endpoint")]
    pub listen_socket: SocketEndpoint,
    /// `tracing_subscriber::EnvFilter` expression.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Telemetry output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Capacity of each freshly allocated parameter buffer.
    #[serde(default = "default_buffer_initial_capacity")]
    pub buffer_initial_capacity: usize,
    /// Aggregate bytes the buffer pool retains between uses.
    #[serde(default = "default_buffer_pool_max_bytes")]
    pub buffer_pool_max_bytes: usize,
    /// Deadline for a single unit of work, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Largest accepted inbound frame, in bytes.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Outstanding requests allowed per connection before reading pauses.
    #[serde(default = "default_max_in_flight_requests")]
    pub max_in_flight_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_socket_endpoint(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            buffer_initial_capacity: default_buffer_initial_capacity(),
            buffer_pool_max_bytes: default_buffer_pool_max_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
            max_request_bytes: default_max_request_bytes(),
            max_in_flight_requests: default_max_in_flight_requests(),
        }
    }
}

impl Config {
    /// Endpoint the daemon listens on.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Capacity of freshly allocated parameter buffers.
    #[must_use]
    pub fn buffer_initial_capacity(&self) -> usize {
        self.buffer_initial_capacity
    }

    /// Aggregate byte budget of the buffer pool.
    #[must_use]
    pub fn buffer_pool_max_bytes(&self) -> usize {
        self.buffer_pool_max_bytes
    }

    /// Deadline applied to every unit of work.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Largest accepted inbound frame.
    #[must_use]
    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Outstanding requests allowed per connection, never less than one.
    #[must_use]
    pub fn max_in_flight_requests(&self) -> usize {
        self.max_in_flight_requests.max(1)
    }
}
