use std::process::ExitCode;
use std::sync::Arc;

use wgated::{StructuredHealthReporter, SystemConfigLoader, bootstrap_with, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let daemon = match bootstrap_with(&SystemConfigLoader, reporter, handlers::builtin_registry())
    {
        Ok(daemon) => daemon,
        // The reporter has already logged the failure.
        Err(_) => return ExitCode::FAILURE,
    };

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %error, "failed to listen for shutdown signal");
        }
    };
    match daemon.serve(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "listener failed");
            ExitCode::FAILURE
        }
    }
}
