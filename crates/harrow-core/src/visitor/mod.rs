//! The operation visitor pipeline.
//!
//! A visit of partition `pd` at logical timestamp `lts` derives the visit's
//! operations from the descriptor selector and feeds them, in order, to a
//! stack of executors:
//!
//! ```text
//! GeneratingVisitor ──▶ LoggingExecutor ──▶ MutatingExecutor ──▶ SUT
//!   (derive ops,          (audit log,          (compile and
//!    enforce order)        best effort)         execute)
//! ```
//!
//! Each executor wraps the next one and hooks before and after delegating.
//! Visits are strictly ordered per visitor: an lts is accepted only if it is
//! greater than every lts the visitor has completed, and a visitor stops
//! accepting visits after a fatal error.

mod generating;
mod logging;
mod mutating;

pub use generating::GeneratingVisitor;
pub use logging::LoggingExecutor;
pub use mutating::{FailurePolicy, MutatingExecutor};

use harrow_types::{Lts, Pd};

use crate::error::VisitError;
use crate::operation::Operation;
use crate::statement::CompiledStatement;

/// Visits partitions in logical-timestamp order.
pub trait Visitor: Send {
    fn visit(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError>;
}

/// Whether a compiled statement took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Rejected and dropped under [`FailurePolicy::SkipAndContinue`].
    Skipped,
}

/// What a stage did with one operation.
///
/// The compiled statement is carried whatever the outcome, including when
/// execution failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub statement: Option<CompiledStatement>,
    pub outcome: Result<Outcome, VisitError>,
}

impl Executed {
    pub fn applied(statement: CompiledStatement) -> Self {
        Self {
            statement: Some(statement),
            outcome: Ok(Outcome::Applied),
        }
    }

    pub fn skipped(statement: CompiledStatement) -> Self {
        Self {
            statement: Some(statement),
            outcome: Ok(Outcome::Skipped),
        }
    }

    pub fn failed(statement: Option<CompiledStatement>, error: VisitError) -> Self {
        Self {
            statement,
            outcome: Err(error),
        }
    }
}

/// One stage of the pipeline.
pub trait VisitExecutor: Send {
    /// Fired once before the first operation of a visit.
    fn before_lts(&mut self, _lts: Lts, _pd: Pd) -> Result<(), VisitError> {
        Ok(())
    }

    /// Executes one operation. A fatal error is returned in the outcome.
    fn operation(&mut self, operation: &Operation) -> Executed;

    /// Fired exactly once after every operation of a visit has executed.
    fn after_lts(&mut self, _lts: Lts, _pd: Pd) -> Result<(), VisitError> {
        Ok(())
    }
}

impl<E: VisitExecutor + ?Sized> VisitExecutor for Box<E> {
    fn before_lts(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        (**self).before_lts(lts, pd)
    }

    fn operation(&mut self, operation: &Operation) -> Executed {
        (**self).operation(operation)
    }

    fn after_lts(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        (**self).after_lts(lts, pd)
    }
}

impl<V: Visitor + ?Sized> Visitor for Box<V> {
    fn visit(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        (**self).visit(lts, pd)
    }
}
