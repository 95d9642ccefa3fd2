//! Error types for socket listener operations.

use std::io;

use thiserror::Error;
use wgate_config::SocketEndpoint;

/// A listener failure, tagged with the endpoint it concerns.
#[derive(Debug, Error)]
#[error("listener on {endpoint}: {kind}")]
pub struct ListenerError {
    endpoint: SocketEndpoint,
    #[source]
    kind: ListenerErrorKind,
}

impl ListenerError {
    pub(crate) fn new(endpoint: &SocketEndpoint, kind: ListenerErrorKind) -> Self {
        Self {
            endpoint: endpoint.clone(),
            kind,
        }
    }

    /// Endpoint the failure concerns.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// What went wrong.
    #[must_use]
    pub fn kind(&self) -> &ListenerErrorKind {
        &self.kind
    }

    /// Whether retrying later could succeed, because another process holds
    /// the endpoint or the accept loop died rather than the endpoint being
    /// unusable.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match &self.kind {
            ListenerErrorKind::InUse | ListenerErrorKind::Aborted(_) => true,
            ListenerErrorKind::Bind(source) => source.kind() == io::ErrorKind::AddrInUse,
            _ => false,
        }
    }
}

/// Reasons a listener could not be bound or kept running.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ListenerErrorKind {
    /// Host name lookup failed.
    #[error("address lookup failed")]
    Resolve(#[source] io::Error),
    /// Host name lookup produced no addresses.
    #[error("address lookup returned nothing")]
    NoAddress,
    /// The operating system refused the bind.
    #[error("bind failed")]
    Bind(#[source] io::Error),
    /// Unix domain sockets are not available on this platform.
    #[error("unix sockets are unsupported on this platform")]
    Unsupported,
    /// A live listener already owns the socket path.
    #[error("socket is held by a running listener")]
    InUse,
    /// The socket path exists and is something other than a socket.
    #[error("path exists and is not a socket")]
    NotASocket,
    /// An existing socket file could not be examined.
    #[error("existing socket could not be inspected")]
    Inspect(#[source] io::Error),
    /// A stale socket file could not be removed.
    #[error("stale socket could not be removed")]
    Cleanup(#[source] io::Error),
    /// The accept loop ended abnormally.
    #[error("accept loop aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn messages_name_the_endpoint_and_keep_the_cause() {
        let endpoint = SocketEndpoint::tcp("127.0.0.1", 9780);
        let error = ListenerError::new(
            &endpoint,
            ListenerErrorKind::Bind(io::Error::from(io::ErrorKind::PermissionDenied)),
        );

        assert_eq!(error.to_string(), "listener on tcp://127.0.0.1:9780: bind failed");
        assert_eq!(error.endpoint(), &endpoint);
        let cause = error
            .source()
            .and_then(|kind| kind.source())
            .expect("io cause kept");
        assert_eq!(
            cause.to_string(),
            io::Error::from(io::ErrorKind::PermissionDenied).to_string()
        );
    }

    #[rstest]
    #[case::held(ListenerErrorKind::InUse, true)]
    #[case::address_taken(ListenerErrorKind::Bind(io::ErrorKind::AddrInUse.into()), true)]
    #[case::aborted(ListenerErrorKind::Aborted("panicked".to_owned()), true)]
    #[case::denied(ListenerErrorKind::Bind(io::ErrorKind::PermissionDenied.into()), false)]
    #[case::not_a_socket(ListenerErrorKind::NotASocket, false)]
    #[case::no_address(ListenerErrorKind::NoAddress, false)]
    fn transient_failures_are_told_apart(#[case] kind: ListenerErrorKind, #[case] transient: bool) {
        let error = ListenerError::new(&SocketEndpoint::tcp("localhost", 1), kind);
        assert_eq!(error.is_transient(), transient);
    }
}
