//! Daemon bootstrap and serve loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::info;

use wgate_config::{Config, SocketPreparationError};
use wgate_sql::{BufferPool, BufferPoolConfig};

use crate::dispatch::{DispatchConnectionHandler, Dispatcher, JsonCodec, Registry};
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{ListenerError, SocketListener};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Source of the daemon configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when no valid configuration could be built.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that reads defaults, files, `WGATE_*` variables and flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        <Config as OrthoConfig>::load()
    }
}

/// Loader that hands out a configuration resolved elsewhere.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The socket's parent directory could not be prepared.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// A bootstrapped daemon, ready to serve.
pub struct Daemon {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    pool: Arc<BufferPool>,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Dispatcher shared by every connection.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Process-wide buffer pool installed during bootstrap.
    #[must_use]
    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Binds the configured endpoint without accepting yet.
    ///
    /// # Errors
    ///
    /// Returns the listener error when the endpoint cannot be bound.
    pub async fn bind(self) -> Result<BoundDaemon, ListenerError> {
        let listener = SocketListener::bind(self.config.listen_socket()).await?;
        Ok(BoundDaemon {
            daemon: self,
            listener,
        })
    }

    /// Binds the endpoint and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns the listener error when binding fails or the accept loop
    /// aborts.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()> + Send,
    {
        self.bind().await?.serve(shutdown).await
    }
}

/// A daemon whose listener is bound.
pub struct BoundDaemon {
    daemon: Daemon,
    listener: SocketListener,
}

impl BoundDaemon {
    /// Bound TCP address, when listening on TCP.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] when the accept loop aborts.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ListenerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self { daemon, listener } = self;
        let endpoint = listener.endpoint().clone();
        let handler = Arc::new(DispatchConnectionHandler::new(
            Arc::clone(&daemon.dispatcher),
            daemon.config.max_request_bytes(),
            daemon.config.max_in_flight_requests(),
        ));
        let handle = listener.start(handler);
        daemon.reporter.listener_ready(&endpoint);

        shutdown.await;
        info!(target: BOOTSTRAP_TARGET, "shutdown requested");
        handle.shutdown();
        let joined = handle.join().await;
        daemon.reporter.listener_stopped(&endpoint);
        joined
    }
}

/// Runs the bootstrap sequence with the supplied collaborators.
///
/// The sequence loads configuration, installs telemetry, prepares the socket
/// directory, sizes the process-wide buffer pool and wires `registry` into a
/// dispatcher. Each failure is reported to `reporter` before it is returned.
///
/// # Errors
///
/// Returns the first failing step as a [`BootstrapError`].
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    registry: Registry,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.listen_socket().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let pool = BufferPool::install_global(BufferPoolConfig {
        initial_capacity: config.buffer_initial_capacity(),
        max_retained_bytes: config.buffer_pool_max_bytes(),
    });
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        Arc::new(JsonCodec),
        config.request_timeout(),
    ));
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon {
        config,
        dispatcher,
        pool,
        telemetry,
        reporter,
    })
}
