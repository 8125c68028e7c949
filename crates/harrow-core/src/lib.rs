//! # harrow-core: deterministic consistency testing
//!
//! harrow generates an unbounded, reproducible stream of writes from a seed,
//! replays it against a system under test (SUT) and, from the same seed,
//! recomputes what the store should hold at any logical time.
//!
//! ## Pieces
//!
//! - [`rng`]: a pure, seekable PCG keyed by seed and schema fingerprint.
//!   Every descriptor is a function of `(seed, schema, stream, steps)`.
//! - [`clock`]: the bijection between logical (`Lts`) and real (`Rts`)
//!   timestamps.
//! - [`pd_selector`] and [`descriptor_selector`]: which partition an lts
//!   visits, and the rows and values each operation writes.
//! - [`visitor`]: the generate, log, mutate pipeline.
//! - [`write_helper`], [`select_helper`], [`statement`]: the statement
//!   compiler and row translation.
//! - [`corruptor`]: fault injection for checking that a model notices.
//! - [`run`], [`runner`], [`validator`]: wiring a run together.
//!
//! ## Quick start
//!
//! ```ignore
//! let run = Run::new(seed, schema, clock, PartitionWindow::default(),
//!                    SelectorConfig::default(), sut)?;
//! run.create_schema()?;
//! let runner = ConcurrentRunner::new(4)?;
//! let report = runner.run(&run.pd_selector, (0..1_000).map(Lts::new), |_| {
//!     run.visitor(ConsistencyLevel::Quorum, FailurePolicy::FailFast, log.clone())
//! });
//! ```

pub mod clock;
pub mod corruptor;
pub mod descriptor_selector;
pub mod error;
pub mod operation;
pub mod oplog;
pub mod pd_selector;
pub mod query;
pub mod rng;
pub mod row;
pub mod run;
pub mod runner;
pub mod select_helper;
pub mod statement;
pub mod streams;
pub mod sut;
pub mod validator;
pub mod visitor;
pub mod write_helper;

pub use clock::{MonotonicClock, OffsetClock};
pub use corruptor::{QueryResponseCorruptor, RowCorruptor};
pub use descriptor_selector::{
    DefaultDescriptorSelector, DescriptorSelector, Distribution, SelectorConfig,
};
pub use error::{
    ClockError, CorruptionError, ModelError, RunnerError, SelectorConfigError, SutError,
    TranslationError, ValidationError, VisitError,
};
pub use operation::Operation;
pub use oplog::OperationLog;
pub use pd_selector::PdSelector;
pub use query::{ClusteringRange, Query, QueryGenerator, QueryKind};
pub use row::ResultSetRow;
pub use run::{CorruptorKind, PartitionWindow, Run, RunVisitor};
pub use runner::{ConcurrentRunner, PartitionFailure, RunReport, run_sequential};
pub use select_helper::SelectHelper;
pub use statement::CompiledStatement;
pub use sut::{Row, SystemUnderTest};
pub use validator::{Model, NoOpModel, Validation, Validator};
pub use visitor::{FailurePolicy, Visitor};
pub use write_helper::WriteHelper;
