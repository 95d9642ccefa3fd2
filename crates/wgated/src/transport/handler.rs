//! Connection handling abstractions for the listener.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

#[cfg(unix)]
use tokio::net::UnixStream;

/// Read half of an accepted connection.
pub(crate) type ConnectionReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of an accepted connection.
pub(crate) type ConnectionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Stream types accepted by the listener.
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Describes the remote end for logs and response routing.
    pub(crate) fn peer(&self) -> String {
        match self {
            Self::Tcp(stream) => stream
                .peer_addr()
                .map_or_else(|_| "tcp:unknown".to_owned(), |addr| format!("tcp:{addr}")),
            #[cfg(unix)]
            Self::Unix(_) => "unix".to_owned(),
        }
    }

    /// Splits the stream so reads and writes can proceed independently.
    pub(crate) fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        match self {
            Self::Tcp(stream) => {
                let (reader, writer) = stream.into_split();
                (Box::new(reader), Box::new(writer))
            }
            #[cfg(unix)]
            Self::Unix(stream) => {
                let (reader, writer) = stream.into_split();
                (Box::new(reader), Box::new(writer))
            }
        }
    }
}

/// Handles accepted socket connections.
#[async_trait]
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Serves a single connection until the peer disconnects.
    async fn handle(&self, stream: ConnectionStream);
}
