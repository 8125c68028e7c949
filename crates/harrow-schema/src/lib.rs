//! # harrow-schema: Table schemas and descriptor codecs
//!
//! A harrow run never stores generated data. Every key and value is
//! recomputed from integer *descriptors*, and this crate owns the mapping
//! between descriptors and concrete column values:
//!
//! - [`DataType`] / [`Value`]: supported column types, their descriptor
//!   domains and order-preserving inflate/deflate.
//! - [`KeyCodec`]: packs multi-column partition and clustering keys into a
//!   single descriptor, preserving key order.
//! - [`SchemaSpec`]: a validated table definition with its codecs and a
//!   stable fingerprint.
//! - [`SchemaGenerator`]: random valid schemas.

mod codec;
mod data_type;
mod error;
mod generator;
mod spec;

pub use codec::KeyCodec;
pub use data_type::{DataType, MAX_ASCII_LENGTH, Value};
pub use error::SchemaError;
pub use generator::SchemaGenerator;
pub use spec::{ColumnKind, ColumnSpec, MAX_MUTABLE_COLUMNS, SchemaSpec, SchemaSpecBuilder};
