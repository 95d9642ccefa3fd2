//! Named, ordered groups of queries that share a result-set lifetime.

use std::fmt;

use crate::query::Query;

/// Results produced by executing a [`QueryBatch`].
///
/// Implemented by the query execution collaborator; the batch only owns the
/// handle and guarantees it is dropped exactly once.
pub trait ResultSetList: Send + Sync {
    /// Number of result sets returned by the batch.
    fn result_set_count(&self) -> usize;

    /// Rows in the result set at `index`.
    fn row_count(&self, index: usize) -> Option<usize>;

    /// Rows affected by the statement at `statement`.
    fn rows_affected(&self, statement: usize) -> Option<u64>;
}

/// An ordered collection of queries plus an exclusively owned result set.
#[derive(Default)]
pub struct QueryBatch {
    name: String,
    queries: Vec<Query>,
    results: Option<Box<dyn ResultSetList>>,
}

impl fmt::Debug for QueryBatch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("QueryBatch")
            .field("name", &self.name)
            .field("queries", &self.queries)
            .field("has_results", &self.results.is_some())
            .finish()
    }
}

impl QueryBatch {
    /// Creates an empty, unnamed batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch labelled `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let mut batch = Self::new();
        batch.set_name(name);
        batch
    }

    /// Sets the diagnostic label, typically the call site.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Diagnostic label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends `query`; queries run in insertion order.
    pub fn add_query(&mut self, query: Query) {
        self.queries.push(query);
    }

    /// Number of queries in the batch.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.queries.len()
    }

    /// Returns `true` when the batch holds no queries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Queries in execution order.
    pub fn queries(&self) -> impl ExactSizeIterator<Item = &Query> {
        self.queries.iter()
    }

    /// Resets the batch for reuse.
    ///
    /// Every query is dropped, returning its buffer to the pool, along with
    /// the name and any held result set.
    pub fn clear(&mut self) {
        self.queries.clear();
        self.name.clear();
        self.results = None;
    }

    /// Stores a new result set, dropping any previous one first.
    pub fn set_results(&mut self, results: Box<dyn ResultSetList>) {
        drop(self.results.take());
        self.results = Some(results);
    }

    /// Drops the held result set, if any.
    pub fn clear_results(&mut self) {
        self.results = None;
    }

    /// The held result set.
    #[must_use]
    pub fn results(&self) -> Option<&dyn ResultSetList> {
        self.results.as_deref()
    }
}
