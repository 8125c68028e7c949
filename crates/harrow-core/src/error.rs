//! Error types for the harrow core.
//!
//! Descriptor derivation and the clock never fail once a run is built.
//! Errors come from three places: configuration (caught before a run
//! starts), the system under test, and translating what it returns.

use harrow_types::{Lts, Pd};
use thiserror::Error;

/// Failure reported by a system under test.
///
/// The core surfaces these unchanged. Retry and backoff belong to the SUT
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SutError {
    #[error("system under test is shut down")]
    Shutdown,

    #[error("statement rejected: {reason} ({statement})")]
    Rejected { statement: String, reason: String },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("timed out after {millis}ms")]
    Timeout { millis: u64 },
}

/// A raw row could not be translated into descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("row has {actual} cells, expected {expected}")]
    Arity { expected: usize, actual: usize },

    #[error("unexpected null in column {column}")]
    UnexpectedNull { column: String },

    #[error("value {value} in column {column} is outside the generated domain")]
    Undecodable { column: String, value: String },

    #[error("write timestamp {rts} of column {column} does not map to a logical timestamp")]
    TimestampOutOfRange { column: String, rts: i64 },
}

/// A visit could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisitError {
    #[error("operation {op_id} at lts {lts} on pd {pd} failed: {source}")]
    Sut {
        lts: Lts,
        pd: Pd,
        op_id: usize,
        #[source]
        source: SutError,
    },

    #[error("lts {lts} visited after lts {last}; visits must be strictly increasing")]
    OutOfOrder { lts: Lts, last: Lts },

    #[error("visitor halted after a fatal error; refusing lts {lts}")]
    Halted { lts: Lts },
}

/// A corruptor failed to read or write the system under test.
///
/// Not finding a row to corrupt is not an error; corruptors report it by
/// returning `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptionError {
    #[error(transparent)]
    Sut(#[from] SutError),

    #[error(transparent)]
    Translation(#[from] TranslationError),
}

/// Invalid clock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("clock base {base} leaves no room for lts up to {max_lts} (max base {max_base})")]
    BaseTooLarge {
        base: u64,
        max_base: u64,
        max_lts: Lts,
    },
}

/// Invalid partition or descriptor selector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorConfigError {
    #[error("max_partition_size must be at least 1")]
    ZeroPartitionSize,

    #[error("window_size and slide_after_repeats must be at least 1")]
    EmptyWindow,

    #[error("window_size {window_size} times slide_after_repeats {slide_after_repeats} exceeds the lts range")]
    WindowOverflow {
        window_size: u64,
        slide_after_repeats: u64,
    },

    #[error("distribution {name} has min {min} greater than max {max}")]
    InvalidDistribution {
        name: &'static str,
        min: u64,
        max: u64,
    },

    #[error("no operation kind with a positive weight applies to this schema")]
    NoOperationWeights,
}

/// The external model rejected what the system under test returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model violation on pd {pd}: {message}")]
pub struct ModelError {
    pub pd: Pd,
    pub message: String,
}

/// Validation of a single query failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Sut(#[from] SutError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("corruptor failed: {0}")]
    Corruption(#[from] CorruptionError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A concurrent run could not start.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
