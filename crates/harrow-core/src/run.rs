//! Everything one run shares, bundled as an explicit value.
//!
//! A [`Run`] is built once from a seed, a schema, a clock and a store, and
//! handed to every component that needs them. Nothing here is global, so
//! independent runs (tests in particular) never share clock state.

use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::{ConsistencyLevel, Lts, Pd};
use serde::{Deserialize, Serialize};

use crate::clock::MonotonicClock;
use crate::corruptor::{
    AddExtraRowCorruptor, ChangeValueCorruptor, HideRowCorruptor, HideValueCorruptor,
    QueryResponseCorruptor, SingleRowCorruptor,
};
use crate::descriptor_selector::{DefaultDescriptorSelector, DescriptorSelector, SelectorConfig};
use crate::error::{SelectorConfigError, SutError};
use crate::oplog::OperationLog;
use crate::pd_selector::{PdSelector, window_cycle};
use crate::query::QueryGenerator;
use crate::rng::PcgRng;
use crate::select_helper::SelectHelper;
use crate::sut::SystemUnderTest;
use crate::visitor::{FailurePolicy, GeneratingVisitor, LoggingExecutor, MutatingExecutor};
use crate::write_helper::WriteHelper;

/// The standard visitor stack.
pub type RunVisitor = GeneratingVisitor<LoggingExecutor<MutatingExecutor>>;

/// Sliding-window partition settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionWindow {
    pub window_size: u64,
    pub slide_after_repeats: u64,
}

impl PartitionWindow {
    /// Checks the window fits the lts range; returns the lts count per slide.
    pub fn cycle(&self) -> Result<u64, SelectorConfigError> {
        window_cycle(self.window_size, self.slide_after_repeats)
    }
}

impl Default for PartitionWindow {
    fn default() -> Self {
        Self {
            window_size: 10,
            slide_after_repeats: 100,
        }
    }
}

/// Available fault injectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptorKind {
    #[default]
    AddExtraRow,
    HideRow,
    HideValue,
    ChangeValue,
}

/// Shared state of one run.
#[derive(Clone)]
pub struct Run {
    pub seed: u64,
    pub schema: Arc<SchemaSpec>,
    pub clock: Arc<dyn MonotonicClock>,
    pub pd_selector: PdSelector,
    pub descriptor_selector: Arc<DefaultDescriptorSelector>,
    pub sut: Arc<dyn SystemUnderTest>,
}

impl Run {
    /// Builds the selectors for `schema`, keying the rng with the seed and
    /// the schema fingerprint.
    pub fn new(
        seed: u64,
        schema: Arc<SchemaSpec>,
        clock: Arc<dyn MonotonicClock>,
        window: PartitionWindow,
        selector: SelectorConfig,
        sut: Arc<dyn SystemUnderTest>,
    ) -> Result<Self, SelectorConfigError> {
        let rng = PcgRng::new(seed, schema.fingerprint());
        let pd_selector = PdSelector::new(
            rng,
            schema.pk_codec().clone(),
            window.window_size,
            window.slide_after_repeats,
        )?;
        let descriptor_selector = Arc::new(DefaultDescriptorSelector::new(
            rng,
            Arc::clone(&schema),
            selector,
        )?);
        Ok(Self {
            seed,
            schema,
            clock,
            pd_selector,
            descriptor_selector,
            sut,
        })
    }

    /// Creates the table in the store.
    pub fn create_schema(&self) -> Result<(), SutError> {
        self.sut.schema_change(&self.schema.create_table_cql())
    }

    pub fn pd(&self, lts: Lts) -> Pd {
        self.pd_selector.pd(lts)
    }

    pub fn write_helper(&self) -> WriteHelper {
        WriteHelper::new(Arc::clone(&self.schema))
    }

    pub fn select_helper(&self) -> SelectHelper {
        SelectHelper::new(Arc::clone(&self.schema), Arc::clone(&self.clock))
    }

    pub fn query_generator(&self) -> QueryGenerator {
        QueryGenerator::new(Arc::clone(&self.descriptor_selector))
    }

    /// Generating, logging and mutating stages wired to this run.
    pub fn visitor(
        &self,
        consistency: ConsistencyLevel,
        policy: FailurePolicy,
        log: OperationLog,
    ) -> RunVisitor {
        let mutating = MutatingExecutor::new(
            self.write_helper(),
            Arc::clone(&self.clock),
            Arc::clone(&self.sut),
            consistency,
            policy,
        );
        GeneratingVisitor::new(
            Arc::clone(&self.descriptor_selector),
            LoggingExecutor::new(mutating, log),
        )
    }

    pub fn corruptor(&self, kind: CorruptorKind) -> Box<dyn QueryResponseCorruptor> {
        let schema = Arc::clone(&self.schema);
        let clock = Arc::clone(&self.clock);
        match kind {
            CorruptorKind::AddExtraRow => {
                let selector: Arc<dyn DescriptorSelector> = self.descriptor_selector.clone();
                Box::new(AddExtraRowCorruptor::new(schema, clock, selector))
            }
            CorruptorKind::HideRow => Box::new(SingleRowCorruptor::new(
                self.seed,
                Arc::clone(&schema),
                Arc::clone(&clock),
                HideRowCorruptor::new(schema, clock),
            )),
            CorruptorKind::HideValue => Box::new(SingleRowCorruptor::new(
                self.seed,
                Arc::clone(&schema),
                Arc::clone(&clock),
                HideValueCorruptor::new(schema, clock),
            )),
            CorruptorKind::ChangeValue => Box::new(SingleRowCorruptor::new(
                self.seed,
                Arc::clone(&schema),
                Arc::clone(&clock),
                ChangeValueCorruptor::new(schema, clock),
            )),
        }
    }
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("seed", &self.seed)
            .field("schema", &self.schema.qualified_name())
            .field("clock", &self.clock)
            .field("pd_selector", &self.pd_selector)
            .finish_non_exhaustive()
    }
}
