//! Structured telemetry for the gateway daemon.
//!
//! The process installs one global subscriber. Its format is fixed by the
//! first configuration seen; later configurations asking for another format
//! are reported and otherwise ignored.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter, time::UtcTime};

use wgate_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Proof that the global subscriber is installed, and in which format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format every event is rendered in.
    #[must_use]
    pub fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter '{filter}': {reason}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// Another subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls return the handle of the first installation.
///
/// # Errors
///
/// Fails when `log_filter` is not a valid `EnvFilter` expression or when a
/// subscriber was installed by someone else.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let handle = INSTALLED.get_or_try_init(|| {
        let subscriber = build_subscriber(config, io::stderr, io::stderr().is_terminal())?;
        tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
        Ok::<_, TelemetryError>(TelemetryHandle {
            format: config.log_format(),
        })
    })?;
    if handle.format != config.log_format() {
        tracing::warn!(
            target: TELEMETRY_TARGET,
            installed = %handle.format,
            requested = %config.log_format(),
            "telemetry already installed, keeping the first format"
        );
    }
    Ok(*handle)
}

/// Builds the subscriber described by `config`, writing through `writer`.
fn build_subscriber<W>(
    config: &Config,
    writer: W,
    ansi: bool,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
        filter: config.log_filter().to_owned(),
        reason: error.to_string(),
    })?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };
    Ok(subscriber)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use rstest::rstest;
    use serde_json::Value;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).expect("utf-8 log output")
        }
    }

    impl Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn config(filter: &str, format: LogFormat) -> Config {
        Config {
            log_filter: filter.to_owned(),
            log_format: format,
            ..Config::default()
        }
    }

    fn emit(config: &Config) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber =
            build_subscriber(config, move || writer.clone(), false).expect("subscriber builds");
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "wgated::dispatch", correlation_id = 7, "request dispatched");
            tracing::debug!(target: "wgated::dispatch", "filtered out");
        });
        captured.text()
    }

    #[rstest]
    fn invalid_filters_are_rejected_with_the_expression() {
        let config = config("wgated=notalevel", LogFormat::Json);
        let error = build_subscriber(&config, io::sink, false)
            .err()
            .expect("filter must not parse");
        assert!(
            matches!(&error, TelemetryError::Filter { filter, .. } if filter == "wgated=notalevel"),
            "{error}"
        );
    }

    #[rstest]
    fn json_events_are_flattened_single_lines() {
        let output = emit(&config("info", LogFormat::Json));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1, "{output}");

        let event: Value = serde_json::from_str(lines[0]).expect("json event");
        assert_eq!(event["target"], "wgated::dispatch");
        assert_eq!(event["message"], "request dispatched");
        assert_eq!(event["correlation_id"], 7);
        assert_eq!(event["level"], "INFO");
    }

    #[rstest]
    fn compact_events_are_plain_text() {
        let output = emit(&config("info", LogFormat::Compact));
        assert!(output.contains("request dispatched"), "{output}");
        assert!(output.contains("correlation_id=7"), "{output}");
        assert!(!output.contains("filtered out"), "{output}");
        assert!(!output.contains('\u{1b}'), "no ansi escapes: {output}");
        assert!(serde_json::from_str::<Value>(output.trim()).is_err());
    }
}
