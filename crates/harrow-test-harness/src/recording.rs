//! A store wrapper that records every statement.

use std::sync::{Mutex, MutexGuard, PoisonError};

use harrow_core::{CompiledStatement, Row, SutError, SystemUnderTest};
use harrow_types::ConsistencyLevel;

/// Delegates to `inner` and records each statement before executing it.
#[derive(Debug)]
pub struct RecordingSut<S> {
    inner: S,
    statements: Mutex<Vec<(CompiledStatement, ConsistencyLevel)>>,
}

impl<S: SystemUnderTest> RecordingSut<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every statement seen, with its consistency level.
    pub fn statements(&self) -> Vec<(CompiledStatement, ConsistencyLevel)> {
        self.recorded().clone()
    }

    /// Mutations seen, in order.
    pub fn writes(&self) -> Vec<CompiledStatement> {
        self.recorded()
            .iter()
            .filter(|(statement, _)| statement.is_write())
            .map(|(statement, _)| statement.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.recorded()
            .iter()
            .filter(|(statement, _)| statement.is_write())
            .count()
    }

    fn recorded(&self) -> MutexGuard<'_, Vec<(CompiledStatement, ConsistencyLevel)>> {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: SystemUnderTest> SystemUnderTest for RecordingSut<S> {
    fn execute(
        &self,
        statement: &CompiledStatement,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>, SutError> {
        self.recorded().push((statement.clone(), consistency));
        self.inner.execute(statement, consistency)
    }

    fn schema_change(&self, statement: &str) -> Result<(), SutError> {
        self.inner.schema_change(statement)
    }

    fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    fn shutdown(&self) -> Result<(), SutError> {
        self.inner.shutdown()
    }
}
