//! Transaction-style front end over [`Query`] and [`QueryBatch`].
//!
//! Units of work build statements through a [`SqlAccess`]: parameters are
//! bound to a lazily created current query, `execute` moves that query into
//! the batch, and `commit` hands the whole batch to a [`QueryExecutor`].

use std::fmt;
use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::SQL_TARGET;
use crate::batch::{QueryBatch, ResultSetList};
use crate::error::{ExecutorError, QueryError, TransactionError};
use crate::param::BindType;
use crate::pool::BufferPool;
use crate::query::Query;

/// Runs a batch against the relational engine.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes every query of `batch` in order and returns the results.
    async fn run_batch(&self, batch: &QueryBatch)
    -> Result<Box<dyn ResultSetList>, ExecutorError>;
}

type Listener = Box<dyn FnOnce() + Send>;

/// Builds and commits query batches for one unit of work.
pub struct SqlAccess {
    pool: Arc<BufferPool>,
    executor: Arc<dyn QueryExecutor>,
    batch: QueryBatch,
    current: Option<Query>,
    open: bool,
    on_commit: Vec<Listener>,
    on_rollback: Vec<Listener>,
}

impl fmt::Debug for SqlAccess {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SqlAccess")
            .field("batch", &self.batch)
            .field("current", &self.current)
            .field("open", &self.open)
            .field("on_commit", &self.on_commit.len())
            .field("on_rollback", &self.on_rollback.len())
            .finish_non_exhaustive()
    }
}

impl SqlAccess {
    /// Creates an idle front end drawing buffers from `pool`.
    #[must_use]
    pub fn new(pool: Arc<BufferPool>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            pool,
            executor,
            batch: QueryBatch::new(),
            current: None,
            open: false,
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
        }
    }

    /// Opens a transaction labelled `name`, discarding the previous batch.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::AlreadyOpen`] when a transaction is open.
    pub fn begin(&mut self, name: impl Into<String>) -> Result<(), TransactionError> {
        if self.open {
            return Err(TransactionError::already_open(self.batch.name()));
        }
        self.batch.clear();
        self.batch.set_name(name);
        self.open = true;
        debug!(target: SQL_TARGET, transaction = self.batch.name(), "transaction opened");
        Ok(())
    }

    /// Returns `true` while a transaction is open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.open
    }

    /// Name of the open transaction.
    #[must_use]
    pub fn transaction_name(&self) -> Option<&str> {
        self.open.then(|| self.batch.name())
    }

    /// The query that parameters are currently bound to, created on demand.
    pub fn current_query(&mut self) -> &mut Query {
        self.current.get_or_insert_with(|| Query::new(&self.pool))
    }

    /// Binds a parameter to the current query.
    ///
    /// # Errors
    ///
    /// Fails when the current query already holds the maximum number of
    /// parameters.
    pub fn add_param(&mut self, bind_type: BindType, raw: &[u8]) -> Result<(), QueryError> {
        self.current_query().add_param(bind_type, raw)
    }

    /// Drops the parameters bound to the current query.
    pub fn clear_params(&mut self) {
        if let Some(query) = self.current.as_mut() {
            query.clear_params();
        }
    }

    /// Finalises the current query with `command` and queues it.
    ///
    /// Outside a transaction the statement is committed on its own.
    ///
    /// # Errors
    ///
    /// Propagates commit failures for standalone statements.
    pub async fn execute(&mut self, command: impl Into<String>) -> Result<(), TransactionError> {
        let command = command.into();
        let standalone = !self.open;
        if standalone {
            self.begin(command.clone())?;
        }

        let mut query = self
            .current
            .take()
            .unwrap_or_else(|| Query::new(&self.pool));
        query.set_command(command);
        self.batch.add_query(query);

        if standalone {
            self.commit(false).await?;
        }
        Ok(())
    }

    /// Runs the queued batch and closes the transaction.
    ///
    /// On success the batch keeps the returned result set and commit
    /// listeners run; on executor failure rollback listeners run instead.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotOpen`] outside a transaction,
    /// [`TransactionError::UnexecutedQuery`] while bound parameters await
    /// `execute` (the transaction stays open), [`TransactionError::Empty`] for
    /// an empty batch unless `allow_empty` is set, and
    /// [`TransactionError::Executor`] when the executor fails.
    pub async fn commit(&mut self, allow_empty: bool) -> Result<(), TransactionError> {
        if !self.open {
            return Err(TransactionError::NotOpen);
        }
        if let Some(pending) = self.current.as_ref().filter(|q| q.param_count() > 0) {
            return Err(TransactionError::UnexecutedQuery {
                name: self.batch.name().to_owned(),
                params: pending.param_count(),
            });
        }
        self.current = None;

        if self.batch.is_empty() {
            let name = self.batch.name().to_owned();
            if allow_empty {
                self.close(true);
                return Ok(());
            }
            self.close(false);
            return Err(TransactionError::empty(name));
        }

        let outcome = self.executor.run_batch(&self.batch).await;
        match outcome {
            Ok(results) => {
                debug!(
                    target: SQL_TARGET,
                    transaction = self.batch.name(),
                    statements = self.batch.statement_count(),
                    result_sets = results.result_set_count(),
                    "transaction committed"
                );
                self.batch.set_results(results);
                self.close(true);
                Ok(())
            }
            Err(error) => {
                warn!(
                    target: SQL_TARGET,
                    transaction = self.batch.name(),
                    error = %error,
                    "transaction failed"
                );
                let name = self.batch.name().to_owned();
                self.close(false);
                Err(TransactionError::executor(name, error))
            }
        }
    }

    /// Abandons the open transaction and runs rollback listeners.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotOpen`] outside a transaction.
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        if !self.open {
            return Err(TransactionError::NotOpen);
        }
        debug!(target: SQL_TARGET, transaction = self.batch.name(), "transaction rolled back");
        self.current = None;
        self.batch.clear();
        self.close(false);
        Ok(())
    }

    /// Registers `listener` to run once if the open transaction commits.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotOpen`] outside a transaction.
    pub fn add_commit_listener(
        &mut self,
        listener: impl FnOnce() + Send + 'static,
    ) -> Result<(), TransactionError> {
        if !self.open {
            return Err(TransactionError::NotOpen);
        }
        self.on_commit.push(Box::new(listener));
        Ok(())
    }

    /// Registers `listener` to run once if the open transaction fails or is
    /// rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotOpen`] outside a transaction.
    pub fn add_rollback_listener(
        &mut self,
        listener: impl FnOnce() + Send + 'static,
    ) -> Result<(), TransactionError> {
        if !self.open {
            return Err(TransactionError::NotOpen);
        }
        self.on_rollback.push(Box::new(listener));
        Ok(())
    }

    /// The batch built by the most recent transaction.
    #[must_use]
    pub const fn batch(&self) -> &QueryBatch {
        &self.batch
    }

    /// Results of the last committed batch.
    #[must_use]
    pub fn results(&self) -> Option<&dyn ResultSetList> {
        self.batch.results()
    }

    /// Rows affected by `statement` in the last committed batch.
    #[must_use]
    pub fn rows_affected(&self, statement: usize) -> Option<u64> {
        self.results()?.rows_affected(statement)
    }

    fn close(&mut self, committed: bool) {
        self.open = false;
        let (fire, discard) = if committed {
            (mem::take(&mut self.on_commit), mem::take(&mut self.on_rollback))
        } else {
            (mem::take(&mut self.on_rollback), mem::take(&mut self.on_commit))
        };
        drop(discard);
        for listener in fire {
            listener();
        }
    }
}
