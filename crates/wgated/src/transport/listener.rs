//! Accept loop for the gateway's socket endpoint.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, lookup_host};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wgate_config::SocketEndpoint;

use super::errors::ListenerErrorKind;
use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixListener;

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a socket endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl SocketListener {
    /// Binds `endpoint`, replacing a stale Unix socket file if one is left
    /// behind.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be resolved or bound, or when a Unix
    /// socket path is held by a live listener.
    pub async fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let bound = match endpoint {
            SocketEndpoint::Tcp { host, port } => bind_tcp(host, *port).await.map(ListenerKind::Tcp),
            SocketEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    bind_unix(path.as_std_path()).map(ListenerKind::Unix)
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(ListenerErrorKind::Unsupported)
                }
            }
        };
        let listener = bound.map_err(|kind| ListenerError::new(endpoint, kind))?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Endpoint this listener serves.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Bound TCP address, if this is a TCP listener.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// Starts accepting connections on a background task.
    pub(crate) fn start(self, handler: Arc<dyn ConnectionHandler>) -> ListenerHandle {
        let (shutdown, signal) = watch::channel(false);
        let endpoint = self.endpoint.clone();
        let task = tokio::spawn(run_accept_loop(self, signal, handler));
        ListenerHandle {
            endpoint,
            shutdown,
            task: Some(task),
        }
    }
}

/// Handle to the background accept loop.
#[derive(Debug)]
pub struct ListenerHandle {
    endpoint: SocketEndpoint,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerErrorKind::Aborted`] when the loop panicked.
    pub async fn join(mut self) -> Result<(), ListenerError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        task.await.map_err(|error| {
            ListenerError::new(&self.endpoint, ListenerErrorKind::Aborted(error.to_string()))
        })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn run_accept_loop(
    listener: SocketListener,
    mut shutdown: watch::Receiver<bool>,
    handler: Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    loop {
        let accepted = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            accepted = accept_connection(&listener) => accepted,
        };
        match accepted {
            Ok(stream) => {
                last_error = None;
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.handle(stream).await });
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    debug!(target: LISTENER_TARGET, endpoint = %listener.endpoint, "socket listener stopped");
    #[cfg(unix)]
    cleanup_unix_socket(&listener.endpoint);
}

async fn accept_connection(listener: &SocketListener) -> io::Result<ConnectionStream> {
    match &listener.listener {
        ListenerKind::Tcp(tcp) => {
            let (stream, _) = tcp.accept().await?;
            Ok(ConnectionStream::Tcp(stream))
        }
        #[cfg(unix)]
        ListenerKind::Unix(unix) => {
            let (stream, _) = unix.accept().await?;
            Ok(ConnectionStream::Unix(stream))
        }
    }
}

async fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerErrorKind> {
    let addr = lookup_host((host, port))
        .await
        .map_err(ListenerErrorKind::Resolve)?
        .next()
        .ok_or(ListenerErrorKind::NoAddress)?;
    debug!(target: LISTENER_TARGET, %addr, "binding tcp listener");
    TcpListener::bind(addr).await.map_err(ListenerErrorKind::Bind)
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerErrorKind> {
    if path.exists() {
        remove_stale_socket(path)?;
    }
    UnixListener::bind(path).map_err(ListenerErrorKind::Bind)
}

/// Clears a socket file left by a listener that is no longer running.
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> Result<(), ListenerErrorKind> {
    let metadata = fs::symlink_metadata(path).map_err(ListenerErrorKind::Inspect)?;
    if !metadata.file_type().is_socket() {
        return Err(ListenerErrorKind::NotASocket);
    }
    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_live) => Err(ListenerErrorKind::InUse),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(target: LISTENER_TARGET, path = %path.display(), "removing stale socket");
            fs::remove_file(path).map_err(ListenerErrorKind::Cleanup)
        }
        Err(source) => Err(ListenerErrorKind::Inspect(source)),
    }
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
