//! The mutating stage: compiles operations and executes them.

use std::sync::Arc;

use harrow_types::ConsistencyLevel;
use serde::{Deserialize, Serialize};

use super::{Executed, VisitExecutor};
use crate::clock::MonotonicClock;
use crate::error::VisitError;
use crate::operation::Operation;
use crate::sut::SystemUnderTest;
use crate::write_helper::WriteHelper;

/// What to do when the system under test rejects a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the partition at the first failure.
    #[default]
    FailFast,
    /// Log a warning and continue with the next operation.
    SkipAndContinue,
}

/// Executes every operation at `rts(lts)` against the system under test.
pub struct MutatingExecutor {
    write_helper: WriteHelper,
    clock: Arc<dyn MonotonicClock>,
    sut: Arc<dyn SystemUnderTest>,
    consistency: ConsistencyLevel,
    policy: FailurePolicy,
    skipped: u64,
}

impl MutatingExecutor {
    pub fn new(
        write_helper: WriteHelper,
        clock: Arc<dyn MonotonicClock>,
        sut: Arc<dyn SystemUnderTest>,
        consistency: ConsistencyLevel,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            write_helper,
            clock,
            sut,
            consistency,
            policy,
            skipped: 0,
        }
    }

    /// Operations dropped under [`FailurePolicy::SkipAndContinue`].
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl VisitExecutor for MutatingExecutor {
    fn operation(&mut self, operation: &Operation) -> Executed {
        let statement = self
            .write_helper
            .compile(operation, self.clock.rts(operation.lts));
        let Err(source) = self.sut.execute(&statement, self.consistency) else {
            return Executed::applied(statement);
        };
        match self.policy {
            FailurePolicy::FailFast => Executed::failed(
                Some(statement),
                VisitError::Sut {
                    lts: operation.lts,
                    pd: operation.pd,
                    op_id: operation.op_id,
                    source,
                },
            ),
            FailurePolicy::SkipAndContinue => {
                self.skipped += 1;
                tracing::warn!(
                    lts = %operation.lts,
                    pd = %operation.pd,
                    op_id = operation.op_id,
                    error = %source,
                    "skipping failed operation"
                );
                Executed::skipped(statement)
            }
        }
    }
}

impl std::fmt::Debug for MutatingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutatingExecutor")
            .field("consistency", &self.consistency)
            .field("policy", &self.policy)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
