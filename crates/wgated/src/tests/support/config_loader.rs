//! Configuration loaders for bootstrap scenarios.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;
use wgate_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that places the listen socket under a temporary directory.
pub struct TestConfigLoader {
    socket_dir: TempDir,
    endpoint: Option<SocketEndpoint>,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        Self {
            socket_dir: TempDir::new().expect("temporary socket directory"),
            endpoint: None,
        }
    }

    /// Listens on an ephemeral loopback TCP port instead.
    pub fn tcp() -> Self {
        Self {
            endpoint: Some(SocketEndpoint::tcp("127.0.0.1", 0)),
            ..Self::new()
        }
    }

    fn endpoint(&self) -> SocketEndpoint {
        self.endpoint.clone().unwrap_or_else(|| {
            let path = self.socket_dir.path().join("nested").join("wgated.sock");
            SocketEndpoint::unix(
                path.to_str()
                    .expect("temporary socket path is UTF-8")
                    .to_owned(),
            )
        })
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_socket: self.endpoint(),
            request_timeout_ms: 2_000,
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unsupported socket scheme.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("wgated"),
            OsString::from("--listen-socket"),
            OsString::from("invalid://socket"),
        ];
        <Config as OrthoConfig>::load_from_iter(args)
    }
}
