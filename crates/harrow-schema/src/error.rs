//! Schema error types.

use thiserror::Error;

/// Errors raised while building or validating a schema.
///
/// These are configuration errors: they are caught before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema {table} has no partition key columns")]
    NoPartitionKey { table: String },

    #[error("schema {table} has no regular columns")]
    NoRegularColumns { table: String },

    #[error("schema {table} declares static columns without clustering columns")]
    StaticWithoutClustering { table: String },

    #[error("duplicate column name: {name}")]
    DuplicateColumn { name: String },

    #[error("too many {kind} columns: {count} (max {max})")]
    TooManyColumns {
        kind: &'static str,
        count: usize,
        max: usize,
    },

    #[error("invalid identifier: {name:?}")]
    InvalidIdentifier { name: String },

    #[error("invalid data type: {0}")]
    InvalidType(String),
}
