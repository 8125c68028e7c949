//! The generating stage: derives operations and enforces visit order.

use std::sync::Arc;

use harrow_types::{Lts, Pd};

use super::{VisitExecutor, Visitor};
use crate::descriptor_selector::DefaultDescriptorSelector;
use crate::error::VisitError;

/// Derives each visit's operations and drives an executor through them.
///
/// State per visitor: the last completed lts and whether a fatal error has
/// halted it.
#[derive(Debug)]
pub struct GeneratingVisitor<E> {
    selector: Arc<DefaultDescriptorSelector>,
    executor: E,
    last_lts: Option<Lts>,
    halted: bool,
}

impl<E: VisitExecutor> GeneratingVisitor<E> {
    pub fn new(selector: Arc<DefaultDescriptorSelector>, executor: E) -> Self {
        Self {
            selector,
            executor,
            last_lts: None,
            halted: false,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Last lts whose visit completed.
    pub fn last_lts(&self) -> Option<Lts> {
        self.last_lts
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn run(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        self.executor.before_lts(lts, pd)?;
        for operation in self.selector.operations(pd, lts) {
            self.executor.operation(&operation).outcome?;
        }
        self.executor.after_lts(lts, pd)
    }
}

impl<E: VisitExecutor> Visitor for GeneratingVisitor<E> {
    fn visit(&mut self, lts: Lts, pd: Pd) -> Result<(), VisitError> {
        if self.halted {
            return Err(VisitError::Halted { lts });
        }
        if let Some(last) = self.last_lts
            && lts <= last
        {
            return Err(VisitError::OutOfOrder { lts, last });
        }

        tracing::debug!(%lts, %pd, "visiting partition");
        match self.run(lts, pd) {
            Ok(()) => {
                self.last_lts = Some(lts);
                Ok(())
            }
            Err(error) => {
                self.halted = true;
                Err(error)
            }
        }
    }
}
