//! Table schema: key, static and regular columns plus derived codecs.

use std::collections::HashSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::codec::KeyCodec;
use crate::data_type::DataType;
use crate::error::SchemaError;

/// Maximum number of static or regular columns. Column subsets are
/// carried as 64-bit masks.
pub const MAX_MUTABLE_COLUMNS: usize = 64;

const MAX_IDENTIFIER_LENGTH: usize = 48;

/// Role of a column in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Static,
    Regular,
}

impl ColumnKind {
    fn tag(self) -> u8 {
        match self {
            ColumnKind::PartitionKey => 1,
            ColumnKind::Clustering => 2,
            ColumnKind::Static => 3,
            ColumnKind::Regular => 4,
        }
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnKind::PartitionKey => "partition-key",
            ColumnKind::Clustering => "clustering",
            ColumnKind::Static => "static",
            ColumnKind::Regular => "regular",
        })
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            data_type,
            kind,
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// An immutable, validated table schema.
///
/// Built through [`SchemaSpec::builder`] or [`SchemaSpec::from_columns`].
/// Column order within each kind is significant: key codecs pack columns in
/// declaration order and value descriptors are aligned with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSpec {
    keyspace: String,
    table: String,
    partition_keys: Vec<ColumnSpec>,
    clustering_keys: Vec<ColumnSpec>,
    statics: Vec<ColumnSpec>,
    regulars: Vec<ColumnSpec>,
    pk_codec: KeyCodec,
    ck_codec: KeyCodec,
    fingerprint: u64,
}

impl SchemaSpec {
    pub fn builder(keyspace: impl Into<String>, table: impl Into<String>) -> SchemaSpecBuilder {
        SchemaSpecBuilder {
            keyspace: keyspace.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Builds a schema from a flat column list, grouping columns by kind.
    pub fn from_columns(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = ColumnSpec>,
    ) -> Result<Self, SchemaError> {
        let mut builder = Self::builder(keyspace, table);
        builder.columns.extend(columns);
        builder.build()
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `keyspace.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn partition_keys(&self) -> &[ColumnSpec] {
        &self.partition_keys
    }

    pub fn clustering_keys(&self) -> &[ColumnSpec] {
        &self.clustering_keys
    }

    pub fn statics(&self) -> &[ColumnSpec] {
        &self.statics
    }

    pub fn regulars(&self) -> &[ColumnSpec] {
        &self.regulars
    }

    pub fn has_statics(&self) -> bool {
        !self.statics.is_empty()
    }

    pub fn pk_codec(&self) -> &KeyCodec {
        &self.pk_codec
    }

    pub fn ck_codec(&self) -> &KeyCodec {
        &self.ck_codec
    }

    /// Stable 64-bit hash of table name, column names, kinds and types.
    ///
    /// Mixed into the descriptor rng so two schemas run with the same seed
    /// produce unrelated streams.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// All columns in key, static, regular order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.partition_keys
            .iter()
            .chain(&self.clustering_keys)
            .chain(&self.statics)
            .chain(&self.regulars)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns().find(|column| column.name == name)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema.
    pub fn create_table_cql(&self) -> String {
        let names = |columns: &[ColumnSpec]| {
            columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut cql = format!("CREATE TABLE IF NOT EXISTS {} (", self.qualified_name());
        for column in self.columns() {
            cql.push_str(&column.name);
            cql.push(' ');
            cql.push_str(column.data_type.cql_name());
            if column.kind == ColumnKind::Static {
                cql.push_str(" static");
            }
            cql.push_str(", ");
        }
        cql.push_str("PRIMARY KEY ((");
        cql.push_str(&names(&self.partition_keys));
        cql.push(')');
        if !self.clustering_keys.is_empty() {
            cql.push_str(", ");
            cql.push_str(&names(&self.clustering_keys));
        }
        cql.push_str("));");
        cql
    }
}

impl Display for SchemaSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.qualified_name())?;
        for (i, column) in self.columns().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", column.name, column.data_type)?;
            match column.kind {
                ColumnKind::PartitionKey => f.write_str(" pk")?,
                ColumnKind::Clustering => f.write_str(" ck")?,
                ColumnKind::Static => f.write_str(" static")?,
                ColumnKind::Regular => {}
            }
        }
        f.write_str(")")
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates columns and validates them into a [`SchemaSpec`].
#[derive(Debug, Clone)]
pub struct SchemaSpecBuilder {
    keyspace: String,
    table: String,
    columns: Vec<ColumnSpec>,
}

impl SchemaSpecBuilder {
    pub fn partition_key(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(ColumnSpec::new(name, data_type, ColumnKind::PartitionKey))
    }

    pub fn clustering_key(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(ColumnSpec::new(name, data_type, ColumnKind::Clustering))
    }

    pub fn static_column(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(ColumnSpec::new(name, data_type, ColumnKind::Static))
    }

    pub fn regular_column(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.column(ColumnSpec::new(name, data_type, ColumnKind::Regular))
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<SchemaSpec, SchemaError> {
        validate_identifier(&self.keyspace)?;
        validate_identifier(&self.table)?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            validate_identifier(&column.name)?;
            column.data_type.validate()?;
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }

        let of_kind = |kind: ColumnKind| -> Vec<ColumnSpec> {
            self.columns
                .iter()
                .filter(|column| column.kind == kind)
                .cloned()
                .collect()
        };
        let partition_keys = of_kind(ColumnKind::PartitionKey);
        let clustering_keys = of_kind(ColumnKind::Clustering);
        let statics = of_kind(ColumnKind::Static);
        let regulars = of_kind(ColumnKind::Regular);

        if partition_keys.is_empty() {
            return Err(SchemaError::NoPartitionKey { table: self.table });
        }
        if regulars.is_empty() {
            return Err(SchemaError::NoRegularColumns { table: self.table });
        }
        if !statics.is_empty() && clustering_keys.is_empty() {
            return Err(SchemaError::StaticWithoutClustering { table: self.table });
        }
        for (kind, count) in [("static", statics.len()), ("regular", regulars.len())] {
            if count > MAX_MUTABLE_COLUMNS {
                return Err(SchemaError::TooManyColumns {
                    kind,
                    count,
                    max: MAX_MUTABLE_COLUMNS,
                });
            }
        }

        let codec_for =
            |columns: &[ColumnSpec]| KeyCodec::new(columns.iter().map(|c| c.data_type).collect());
        let pk_codec = codec_for(&partition_keys);
        let ck_codec = codec_for(&clustering_keys);

        let fingerprint = {
            let mut hasher = Fnv1a::new();
            hasher.write(self.table.as_bytes());
            for column in partition_keys
                .iter()
                .chain(&clustering_keys)
                .chain(&statics)
                .chain(&regulars)
            {
                hasher.write(&[0, column.kind.tag()]);
                hasher.write(column.name.as_bytes());
                hasher.write(column.data_type.to_string().as_bytes());
            }
            hasher.finish()
        };

        Ok(SchemaSpec {
            keyspace: self.keyspace,
            table: self.table,
            partition_keys,
            clustering_keys,
            statics,
            regulars,
            pk_codec,
            ck_codec,
            fingerprint,
        })
    }
}

fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LENGTH
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// 64-bit FNV-1a. Stable across platforms and releases, unlike `DefaultHasher`.
struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
