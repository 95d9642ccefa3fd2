//! Pooled parameter buffers and query batching for wgate units of work.
//!
//! A [`Query`] packs its bind parameters into a [`Buffer`] borrowed from a
//! shared [`BufferPool`]; queries are grouped into a [`QueryBatch`] that owns
//! the batch's result set. [`SqlAccess`] layers begin/execute/commit semantics
//! on top and hands finished batches to a [`QueryExecutor`].

mod access;
mod batch;
mod error;
mod param;
mod pool;
mod query;

pub(crate) const SQL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::sql");

pub use access::{QueryExecutor, SqlAccess};
pub use batch::{QueryBatch, ResultSetList};
pub use error::{ExecutorError, QueryError, TransactionError};
pub use param::{BindParam, BindType};
pub use pool::{
    Buffer, BufferPool, BufferPoolConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_RETAINED_BYTES,
    PoolStats,
};
pub use query::{MAX_BIND_PARAMS, Query};
