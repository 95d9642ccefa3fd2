#[cfg(unix)]
use std::env;

#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are unavailable.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Initial capacity, in bytes, of freshly allocated parameter buffers.
pub const DEFAULT_BUFFER_INITIAL_CAPACITY: usize = 1024;

/// Aggregate bytes the buffer pool may retain between uses.
pub const DEFAULT_BUFFER_POOL_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Deadline applied to every unit of work, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Largest accepted inbound frame, in bytes.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Requests a single connection may have outstanding before reading pauses.
pub const DEFAULT_MAX_IN_FLIGHT_REQUESTS: usize = 64;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log output format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_buffer_initial_capacity() -> usize {
    DEFAULT_BUFFER_INITIAL_CAPACITY
}

pub(crate) fn default_buffer_pool_max_bytes() -> usize {
    DEFAULT_BUFFER_POOL_MAX_BYTES
}

pub(crate) fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

pub(crate) fn default_max_request_bytes() -> usize {
    DEFAULT_MAX_REQUEST_BYTES
}

pub(crate) fn default_max_in_flight_requests() -> usize {
    DEFAULT_MAX_IN_FLIGHT_REQUESTS
}

/// Computes the default listening endpoint for the gateway.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    platform_socket_endpoint()
}

#[cfg(unix)]
fn platform_socket_endpoint() -> SocketEndpoint {
    let mut base = match runtime_dir().and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok()) {
        Some(mut dir) => {
            dir.push("wgate");
            dir
        }
        None => {
            let mut dir = Utf8PathBuf::from_path_buf(env::temp_dir())
                .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
            dir.push("wgate");
            // Shared temp dirs need a per-user namespace.
            dir.push(format!("uid-{}", unsafe { geteuid() }));
            dir
        }
    };
    base.push("wgated.sock");
    SocketEndpoint::unix(base)
}

#[cfg(not(unix))]
fn platform_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
