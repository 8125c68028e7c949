//! Compiled statements.
//!
//! Statements are kept structured rather than as query text, so stores
//! that speak CQL can render them with [`CompiledStatement::cql`] and
//! [`CompiledStatement::bindings`], while in-process stores interpret them
//! directly. `Display` inlines the bound values and is what the operation
//! log records.

use std::fmt::{self, Display};
use std::ops::Bound;

use harrow_schema::Value;
use harrow_types::Rts;

/// A named column value.
pub type ColumnValue = (String, Value);

/// Clustering restriction of a delete or select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusteringRestriction {
    /// Whole partition.
    None,
    /// One row. Columns listed in clustering order.
    Eq(Vec<ColumnValue>),
    /// A slice of rows. Bounds compare clustering tuples lexicographically.
    Range {
        columns: Vec<String>,
        lower: Bound<Vec<Value>>,
        upper: Bound<Vec<Value>>,
    },
}

impl ClusteringRestriction {
    /// `Eq` restriction, or `None` for tables without clustering columns.
    pub fn row(columns: Vec<ColumnValue>) -> Self {
        if columns.is_empty() {
            ClusteringRestriction::None
        } else {
            ClusteringRestriction::Eq(columns)
        }
    }
}

/// A projected column in a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Column(String),
    /// Write timestamp of a cell.
    WriteTime(String),
}

/// A statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledStatement {
    Insert {
        table: String,
        columns: Vec<ColumnValue>,
        timestamp: Rts,
    },
    Update {
        table: String,
        assignments: Vec<ColumnValue>,
        /// Partition key columns followed by clustering columns. Clustering
        /// columns are omitted when only statics are assigned.
        key: Vec<ColumnValue>,
        timestamp: Rts,
    },
    Delete {
        table: String,
        /// Columns to delete. Empty deletes whole rows.
        columns: Vec<String>,
        partition: Vec<ColumnValue>,
        clustering: ClusteringRestriction,
        timestamp: Rts,
    },
    Select {
        table: String,
        selection: Vec<Selector>,
        partition: Vec<ColumnValue>,
        clustering: ClusteringRestriction,
        /// Clustering columns, for `ORDER BY` when `reverse` is set.
        order_by: Vec<String>,
        reverse: bool,
    },
}

impl CompiledStatement {
    /// Statement text with `?` placeholders.
    pub fn cql(&self) -> String {
        self.render(false).0
    }

    /// Values bound to the placeholders of [`CompiledStatement::cql`], in
    /// order.
    pub fn bindings(&self) -> Vec<Value> {
        self.render(false).1
    }

    pub fn table(&self) -> &str {
        match self {
            CompiledStatement::Insert { table, .. }
            | CompiledStatement::Update { table, .. }
            | CompiledStatement::Delete { table, .. }
            | CompiledStatement::Select { table, .. } => table,
        }
    }

    /// Write timestamp, for mutations.
    pub fn timestamp(&self) -> Option<Rts> {
        match self {
            CompiledStatement::Insert { timestamp, .. }
            | CompiledStatement::Update { timestamp, .. }
            | CompiledStatement::Delete { timestamp, .. } => Some(*timestamp),
            CompiledStatement::Select { .. } => None,
        }
    }

    pub fn is_write(&self) -> bool {
        self.timestamp().is_some()
    }

    fn render(&self, inline: bool) -> (String, Vec<Value>) {
        let mut out = Renderer {
            text: String::new(),
            bindings: Vec::new(),
            inline,
        };
        match self {
            CompiledStatement::Insert {
                table,
                columns,
                timestamp,
            } => {
                let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
                out.push(&format!("INSERT INTO {table} ({}) VALUES (", names.join(", ")));
                for (i, (_, value)) in columns.iter().enumerate() {
                    if i > 0 {
                        out.push(", ");
                    }
                    out.value(value);
                }
                out.push(") USING TIMESTAMP ");
                out.timestamp(*timestamp);
            }
            CompiledStatement::Update {
                table,
                assignments,
                key,
                timestamp,
            } => {
                out.push(&format!("UPDATE {table} USING TIMESTAMP "));
                out.timestamp(*timestamp);
                out.push(" SET ");
                for (i, (name, value)) in assignments.iter().enumerate() {
                    if i > 0 {
                        out.push(", ");
                    }
                    out.push(&format!("{name} = "));
                    out.value(value);
                }
                out.push(" WHERE ");
                out.equalities(key);
            }
            CompiledStatement::Delete {
                table,
                columns,
                partition,
                clustering,
                timestamp,
            } => {
                out.push("DELETE ");
                if !columns.is_empty() {
                    out.push(&columns.join(", "));
                    out.push(" ");
                }
                out.push(&format!("FROM {table} USING TIMESTAMP "));
                out.timestamp(*timestamp);
                out.push(" WHERE ");
                out.equalities(partition);
                out.clustering(clustering);
            }
            CompiledStatement::Select {
                table,
                selection,
                partition,
                clustering,
                order_by,
                reverse,
            } => {
                let projection: Vec<String> = selection
                    .iter()
                    .map(|selector| match selector {
                        Selector::Column(name) => name.clone(),
                        Selector::WriteTime(name) => format!("writetime({name})"),
                    })
                    .collect();
                out.push(&format!(
                    "SELECT {} FROM {table} WHERE ",
                    projection.join(", ")
                ));
                out.equalities(partition);
                out.clustering(clustering);
                if *reverse && !order_by.is_empty() {
                    let order: Vec<String> =
                        order_by.iter().map(|name| format!("{name} DESC")).collect();
                    out.push(&format!(" ORDER BY {}", order.join(", ")));
                }
            }
        }
        out.push(";");
        (out.text, out.bindings)
    }
}

impl Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true).0)
    }
}

struct Renderer {
    text: String,
    bindings: Vec<Value>,
    inline: bool,
}

impl Renderer {
    fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn value(&mut self, value: &Value) {
        if self.inline {
            self.text.push_str(&value.to_string());
        } else {
            self.text.push('?');
            self.bindings.push(value.clone());
        }
    }

    fn timestamp(&mut self, rts: Rts) {
        self.value(&Value::BigInt(rts.as_i64()));
    }

    fn equalities(&mut self, columns: &[ColumnValue]) {
        for (i, (name, value)) in columns.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            self.push(&format!("{name} = "));
            self.value(value);
        }
    }

    fn clustering(&mut self, restriction: &ClusteringRestriction) {
        match restriction {
            ClusteringRestriction::None => {}
            ClusteringRestriction::Eq(columns) => {
                self.push(" AND ");
                self.equalities(columns);
            }
            ClusteringRestriction::Range {
                columns,
                lower,
                upper,
            } => {
                let bounds = [
                    (lower, ">=", ">"),
                    (upper, "<=", "<"),
                ];
                for (bound, inclusive, exclusive) in bounds {
                    let (op, values) = match bound {
                        Bound::Included(values) => (inclusive, values),
                        Bound::Excluded(values) => (exclusive, values),
                        Bound::Unbounded => continue,
                    };
                    self.push(" AND ");
                    self.tuple(columns, op, values);
                }
            }
        }
    }

    /// `ck op ?` for one column, `(ck1, ck2) op (?, ?)` for several.
    fn tuple(&mut self, columns: &[String], op: &str, values: &[Value]) {
        if columns.len() == 1 {
            self.push(&format!("{} {op} ", columns[0]));
            if let Some(value) = values.first() {
                self.value(value);
            }
            return;
        }
        self.push(&format!("({}) {op} (", columns.join(", ")));
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.value(value);
        }
        self.push(")");
    }
}
