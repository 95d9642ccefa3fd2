//! Error types for request dispatch failures.
//!
//! Every variant is reported to the caller as an error document; none of them
//! unwind past the dispatcher.

use std::time::Duration;

use thiserror::Error;

use super::document::{CodecError, Document, error_document};
use super::job::JobError;
use super::privilege::{Privilege, PrivilegeLevel};
use super::result_code::ResultCode;

/// Reasons a request did not produce a successful response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler is registered under the request name.
    #[error("unknown method '{name}'")]
    UnknownMethod {
        /// Requested name.
        name: String,
    },

    /// The caller's privilege differs from the handler's.
    #[error("request '{name}' requires privilege '{expected}' but caller holds '{actual}'")]
    PrivilegeMismatch {
        /// Requested name.
        name: String,
        /// Privilege the handler was registered with.
        expected: Privilege,
        /// Privilege carried by the request.
        actual: PrivilegeLevel,
    },

    /// The request body could not be decoded.
    #[error("failed to decode request document: {source}")]
    Decode {
        /// Codec failure.
        #[source]
        source: CodecError,
    },

    /// A required field is absent from the request document.
    #[error("missing parameter '{param}' from request '{name}'")]
    MissingParameter {
        /// Requested name.
        name: String,
        /// Absent field.
        param: String,
    },

    /// The unit of work did not finish before its deadline.
    #[error("request '{name}' timed out after {} ms", .timeout.as_millis())]
    Timeout {
        /// Requested name.
        name: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The unit of work reported a failure.
    #[error("request '{name}' failed: {source}")]
    Job {
        /// Requested name.
        name: String,
        /// Failure reported by the unit of work.
        #[source]
        source: JobError,
    },
}

impl DispatchError {
    /// Result code reported in the error document.
    #[must_use]
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::UnknownMethod { .. } | Self::Decode { .. } | Self::MissingParameter { .. } => {
                ResultCode::InvalidParam
            }
            Self::PrivilegeMismatch { .. } => ResultCode::AccessDenied,
            Self::Timeout { .. } => ResultCode::Timeout,
            Self::Job { source, .. } => source.code(),
        }
    }

    /// Error document sent back for this failure.
    #[must_use]
    pub fn to_document(&self) -> Document {
        error_document(self.to_string(), self.result_code())
    }

    /// Creates an unknown method error.
    pub fn unknown_method(name: impl Into<String>) -> Self {
        Self::UnknownMethod { name: name.into() }
    }

    /// Creates a privilege mismatch error.
    pub fn privilege_mismatch(
        name: impl Into<String>,
        expected: Privilege,
        actual: PrivilegeLevel,
    ) -> Self {
        Self::PrivilegeMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }

    /// Creates a missing parameter error.
    pub fn missing_parameter(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self::MissingParameter {
            name: name.into(),
            param: param.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(name: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            name: name.into(),
            timeout,
        }
    }

    /// Wraps a unit-of-work failure.
    pub fn job(name: impl Into<String>, source: JobError) -> Self {
        Self::Job {
            name: name.into(),
            source,
        }
    }
}

impl From<CodecError> for DispatchError {
    fn from(source: CodecError) -> Self {
        Self::Decode { source }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::dispatch::document::{ERROR_KEY, result_code};

    #[test]
    fn privilege_errors_name_both_levels() {
        let error = DispatchError::privilege_mismatch(
            "Ping",
            Privilege::Session,
            PrivilegeLevel::from(Privilege::Admin),
        );
        let text = error.to_string();
        assert!(text.contains("session"), "{text}");
        assert!(text.contains("admin"), "{text}");
        assert_eq!(error.result_code(), ResultCode::AccessDenied);
    }

    #[test]
    fn unknown_methods_are_invalid_parameters() {
        let document = DispatchError::unknown_method("DoesNotExist").to_document();
        assert_eq!(result_code(&document), Some(ResultCode::InvalidParam));
        assert_eq!(
            document.get(ERROR_KEY),
            Some(&Value::String("unknown method 'DoesNotExist'".to_owned()))
        );
    }

    #[test]
    fn job_errors_keep_their_code() {
        let error = DispatchError::job("Ping", JobError::invalid_param("bad echo"));
        assert_eq!(error.result_code(), ResultCode::InvalidParam);
        assert_eq!(error.to_string(), "request 'Ping' failed: bad echo");
    }

    #[test]
    fn timeouts_report_the_deadline() {
        let error = DispatchError::timeout("Slow", Duration::from_millis(250));
        assert_eq!(error.to_string(), "request 'Slow' timed out after 250 ms");
        assert_eq!(error.result_code(), ResultCode::Timeout);
    }
}
