//! A single parameterised statement and its pooled parameter buffer.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::SQL_TARGET;
use crate::error::QueryError;
use crate::param::{BindParam, BindType};
use crate::pool::{Buffer, BufferPool};

/// Upper bound on bind parameters per statement.
pub const MAX_BIND_PARAMS: usize = 64;

/// One parameterised statement.
///
/// Parameter values are packed back to back into a buffer borrowed from a
/// [`BufferPool`]; each [`BindParam`] records where its value lives. Dropping
/// the query returns the buffer to the pool.
pub struct Query {
    command: String,
    params: Vec<BindParam>,
    buffer: Buffer,
}

impl fmt::Debug for Query {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Query")
            .field("command", &self.command)
            .field("params", &self.params)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

impl Query {
    /// Creates an empty query backed by a buffer from `pool`.
    #[must_use]
    pub fn new(pool: &Arc<BufferPool>) -> Self {
        Self {
            command: String::new(),
            params: Vec::new(),
            buffer: pool.acquire(),
        }
    }

    /// Creates a query with its command text already set.
    #[must_use]
    pub fn with_command(pool: &Arc<BufferPool>, command: impl Into<String>) -> Self {
        let mut query = Self::new(pool);
        query.set_command(command);
        query
    }

    /// Replaces the statement text.
    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
    }

    /// Statement text.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Appends a parameter whose encoded value is `raw`.
    ///
    /// An empty `raw` records a `NULL` that does not touch the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TooManyParams`] when the query already holds
    /// [`MAX_BIND_PARAMS`] parameters; the query is left unchanged.
    pub fn add_param(&mut self, bind_type: BindType, raw: &[u8]) -> Result<(), QueryError> {
        if self.params.len() >= MAX_BIND_PARAMS {
            warn!(
                target: SQL_TARGET,
                command = %self.command,
                bind_type = %bind_type,
                max = MAX_BIND_PARAMS,
                "rejecting bind parameter over the per-query limit"
            );
            return Err(QueryError::TooManyParams {
                max: MAX_BIND_PARAMS,
            });
        }

        let param = if raw.is_empty() {
            BindParam::null(bind_type)
        } else {
            let offset = self.buffer.append(raw);
            BindParam::new(bind_type, offset, raw.len())
        };
        self.params.push(param);
        Ok(())
    }

    /// Appends a `NULL` of the given type.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_null(&mut self, bind_type: BindType) -> Result<(), QueryError> {
        self.add_param(bind_type, &[])
    }

    /// Appends UTF-8 text.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_str(&mut self, value: &str) -> Result<(), QueryError> {
        self.add_param(BindType::String, value.as_bytes())
    }

    /// Appends binary data.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_blob(&mut self, value: &[u8]) -> Result<(), QueryError> {
        self.add_param(BindType::Blob, value)
    }
}

#[expect(
    clippy::little_endian_bytes,
    reason = "bind parameters are encoded little-endian"
)]
impl Query {
    /// Appends a signed 16-bit integer.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_i16(&mut self, value: i16) -> Result<(), QueryError> {
        self.add_param(BindType::Int16, &value.to_le_bytes())
    }

    /// Appends an unsigned 16-bit integer, stored in a 16-bit column.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_u16(&mut self, value: u16) -> Result<(), QueryError> {
        self.add_param(BindType::Int16, &value.to_le_bytes())
    }

    /// Appends a signed 32-bit integer.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_i32(&mut self, value: i32) -> Result<(), QueryError> {
        self.add_param(BindType::Int32, &value.to_le_bytes())
    }

    /// Appends an unsigned 32-bit integer, stored in a 32-bit column.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_u32(&mut self, value: u32) -> Result<(), QueryError> {
        self.add_param(BindType::Int32, &value.to_le_bytes())
    }

    /// Appends a signed 64-bit integer.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_i64(&mut self, value: i64) -> Result<(), QueryError> {
        self.add_param(BindType::Int64, &value.to_le_bytes())
    }

    /// Appends an unsigned 64-bit integer, stored in a 64-bit column.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_u64(&mut self, value: u64) -> Result<(), QueryError> {
        self.add_param(BindType::Int64, &value.to_le_bytes())
    }

    /// Appends a 32-bit float.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_f32(&mut self, value: f32) -> Result<(), QueryError> {
        self.add_param(BindType::Float, &value.to_le_bytes())
    }

    /// Appends a 64-bit float.
    ///
    /// # Errors
    ///
    /// Fails when the parameter limit is reached.
    pub fn add_f64(&mut self, value: f64) -> Result<(), QueryError> {
        self.add_param(BindType::Double, &value.to_le_bytes())
    }
}

impl Query {
    /// Drops every parameter and resets the buffer, keeping its capacity.
    pub fn clear_params(&mut self) {
        self.params.clear();
        self.buffer.clear();
    }

    /// Bound parameters in insertion order.
    #[must_use]
    pub fn params(&self) -> &[BindParam] {
        &self.params
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Encoded value of the parameter at `index`; empty for `NULL`.
    #[must_use]
    pub fn param_bytes(&self, index: usize) -> Option<&[u8]> {
        let param = self.params.get(index)?;
        if param.is_null() {
            return Some(&[]);
        }
        self.buffer.get(param.offset(), param.len())
    }

    /// Iterates over parameters paired with their encoded values.
    pub fn bound(&self) -> impl Iterator<Item = (BindParam, &[u8])> + '_ {
        (0..self.params.len()).filter_map(|index| {
            let param = *self.params.get(index)?;
            Some((param, self.param_bytes(index)?))
        })
    }

    /// Bytes currently written to the parameter buffer.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
