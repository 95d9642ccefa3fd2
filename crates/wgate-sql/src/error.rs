//! Error types for query building and batch execution.

use thiserror::Error;

/// Errors raised while building a single query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query already holds the maximum number of parameters.
    #[error("query already has the maximum of {max} bind parameters")]
    TooManyParams {
        /// The fixed per-query limit.
        max: usize,
    },
}

/// Failure reported by the external query execution collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query execution failed: {message}")]
pub struct ExecutorError {
    message: String,
}

impl ExecutorError {
    /// Creates an executor error with a human-readable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised by [`crate::SqlAccess`] transaction handling.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// `begin` was called while another transaction is open.
    #[error("transaction '{name}' is already open")]
    AlreadyOpen {
        /// Name of the open transaction.
        name: String,
    },
    /// A transaction-only operation was attempted outside a transaction.
    #[error("no transaction is open")]
    NotOpen,
    /// Commit was requested for a transaction with no statements.
    #[error("transaction '{name}' has no statements to commit")]
    Empty {
        /// Name of the empty transaction.
        name: String,
    },
    /// Commit was requested while a query still awaits `execute`.
    #[error("transaction '{name}' has an unexecuted query with {params} parameters")]
    UnexecutedQuery {
        /// Name of the transaction.
        name: String,
        /// Parameters bound to the pending query.
        params: usize,
    },
    /// The executor rejected the batch.
    #[error("transaction '{name}' failed: {source}")]
    Executor {
        /// Name of the failed transaction.
        name: String,
        /// Underlying executor failure.
        #[source]
        source: ExecutorError,
    },
    /// Building a query failed.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl TransactionError {
    /// Creates an already-open error.
    pub fn already_open(name: impl Into<String>) -> Self {
        Self::AlreadyOpen { name: name.into() }
    }

    /// Creates an empty-transaction error.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::Empty { name: name.into() }
    }

    /// Creates an executor failure for the named transaction.
    pub fn executor(name: impl Into<String>, source: ExecutorError) -> Self {
        Self::Executor {
            name: name.into(),
            source,
        }
    }
}
