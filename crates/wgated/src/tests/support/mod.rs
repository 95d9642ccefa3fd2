//! Shared test doubles for dispatch and bootstrap suites.

mod config_loader;
mod jobs;
mod reporter;
mod sink;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use jobs::{
    EchoJob, FailingJob, PendingJob, SpyFactory, UnencodableCodec, WaitingJob, request,
};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use sink::RecordingSink;
