//! The system-under-test contract.
//!
//! The core drives stores only through this trait. Network transport,
//! drivers and retry policy live in implementations.

use std::future::Future;
use std::pin::Pin;

use harrow_schema::Value;
use harrow_types::ConsistencyLevel;

use crate::error::SutError;
use crate::statement::CompiledStatement;

/// A raw result row. Cells are `None` for nulls.
pub type Row = Vec<Option<Value>>;

/// Rows produced by [`SystemUnderTest::execute_async`].
pub type SutFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Row>, SutError>> + Send + 'a>>;

/// A store accepting statements.
///
/// Implementations are shared across partition workers and must be
/// `Send + Sync`.
pub trait SystemUnderTest: Send + Sync {
    /// Executes a statement and returns its rows. Writes return no rows.
    fn execute(
        &self,
        statement: &CompiledStatement,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>, SutError>;

    /// Asynchronous [`SystemUnderTest::execute`].
    ///
    /// The default runs the statement synchronously and returns a ready
    /// future. Callers awaiting writes must still complete one lts before
    /// issuing the next for the same partition.
    fn execute_async<'a>(
        &'a self,
        statement: &'a CompiledStatement,
        consistency: ConsistencyLevel,
    ) -> SutFuture<'a> {
        let result = self.execute(statement, consistency);
        Box::pin(std::future::ready(result))
    }

    /// Applies a structural change such as `CREATE TABLE`.
    fn schema_change(&self, statement: &str) -> Result<(), SutError>;

    fn is_shutdown(&self) -> bool;

    fn shutdown(&self) -> Result<(), SutError>;
}

impl<S: SystemUnderTest + ?Sized> SystemUnderTest for std::sync::Arc<S> {
    fn execute(
        &self,
        statement: &CompiledStatement,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>, SutError> {
        (**self).execute(statement, consistency)
    }

    fn execute_async<'a>(
        &'a self,
        statement: &'a CompiledStatement,
        consistency: ConsistencyLevel,
    ) -> SutFuture<'a> {
        (**self).execute_async(statement, consistency)
    }

    fn schema_change(&self, statement: &str) -> Result<(), SutError> {
        (**self).schema_change(statement)
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }

    fn shutdown(&self) -> Result<(), SutError> {
        (**self).shutdown()
    }
}
