//! Random schema generation.
//!
//! Used to widen coverage beyond hand-written schemas: each run can pick a
//! fresh table shape from its seed.

use rand::Rng;

use crate::data_type::{DataType, MAX_ASCII_LENGTH};
use crate::error::SchemaError;
use crate::spec::SchemaSpec;

/// Bounds on the shape of generated schemas.
#[derive(Debug, Clone)]
pub struct SchemaGenerator {
    keyspace: String,
    max_partition_keys: usize,
    max_clustering_keys: usize,
    max_statics: usize,
    max_regulars: usize,
}

impl SchemaGenerator {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            max_partition_keys: 2,
            max_clustering_keys: 3,
            max_statics: 2,
            max_regulars: 5,
        }
    }

    pub fn with_max_partition_keys(mut self, max: usize) -> Self {
        self.max_partition_keys = max.max(1);
        self
    }

    pub fn with_max_clustering_keys(mut self, max: usize) -> Self {
        self.max_clustering_keys = max;
        self
    }

    pub fn with_max_statics(mut self, max: usize) -> Self {
        self.max_statics = max;
        self
    }

    pub fn with_max_regulars(mut self, max: usize) -> Self {
        self.max_regulars = max.max(1);
        self
    }

    /// Generates a schema named `table_<index>`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        index: usize,
    ) -> Result<SchemaSpec, SchemaError> {
        let mut builder = SchemaSpec::builder(self.keyspace.clone(), format!("table_{index}"));

        for i in 0..rng.gen_range(1..=self.max_partition_keys) {
            builder = builder.partition_key(format!("pk{i}"), random_key_type(rng));
        }
        let clustering = rng.gen_range(0..=self.max_clustering_keys);
        for i in 0..clustering {
            builder = builder.clustering_key(format!("ck{i}"), random_key_type(rng));
        }
        if clustering > 0 {
            for i in 0..rng.gen_range(0..=self.max_statics) {
                builder = builder.static_column(format!("s{i}"), random_value_type(rng));
            }
        }
        for i in 0..rng.gen_range(1..=self.max_regulars) {
            builder = builder.regular_column(format!("v{i}"), random_value_type(rng));
        }
        builder.build()
    }
}

// Booleans make poor keys: two values per column collapse partitions.
fn random_key_type<R: Rng + ?Sized>(rng: &mut R) -> DataType {
    match rng.gen_range(0..5) {
        0 => DataType::TinyInt,
        1 => DataType::SmallInt,
        2 => DataType::Integer,
        3 => DataType::BigInt,
        _ => DataType::Ascii {
            length: rng.gen_range(2..=MAX_ASCII_LENGTH),
        },
    }
}

fn random_value_type<R: Rng + ?Sized>(rng: &mut R) -> DataType {
    if rng.gen_ratio(1, 6) {
        DataType::Boolean
    } else {
        random_key_type(rng)
    }
}
