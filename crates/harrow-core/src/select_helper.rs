//! Read statements and row translation.
//!
//! A select reads, in order: partition key columns, clustering columns,
//! static columns, regular columns, then `writetime` of every static and
//! every regular column. [`SelectHelper::to_row`] reverses that layout into
//! a [`ResultSetRow`], mapping write times back to lts through the clock.

use std::ops::Bound;
use std::sync::Arc;

use harrow_schema::{ColumnSpec, SchemaSpec, Value};
use harrow_types::{Cd, ConsistencyLevel, Lts, Pd, Rts};

use crate::clock::MonotonicClock;
use crate::error::{CorruptionError, TranslationError};
use crate::query::{Query, QueryKind};
use crate::row::ResultSetRow;
use crate::statement::{ClusteringRestriction, ColumnValue, CompiledStatement, Selector};
use crate::sut::{Row, SystemUnderTest};

/// Projection read by every select, in row layout order.
pub fn selection(schema: &SchemaSpec) -> Vec<Selector> {
    let column = |c: &ColumnSpec| Selector::Column(c.name.clone());
    let write_time = |c: &ColumnSpec| Selector::WriteTime(c.name.clone());
    schema
        .columns()
        .map(column)
        .chain(schema.statics().iter().map(write_time))
        .chain(schema.regulars().iter().map(write_time))
        .collect()
}

/// Partition key equalities for `pd`.
pub fn partition_key(schema: &SchemaSpec, pd: Pd) -> Vec<ColumnValue> {
    named(schema.partition_keys(), schema.pk_codec().inflate(pd.as_u64()))
}

/// Clustering column equalities for `cd`.
pub fn clustering_key(schema: &SchemaSpec, cd: Cd) -> Vec<ColumnValue> {
    named(schema.clustering_keys(), schema.ck_codec().inflate(cd.as_u64()))
}

/// Clustering restriction covering `lower..upper`.
pub fn clustering_range(
    schema: &SchemaSpec,
    lower: Bound<Cd>,
    upper: Bound<Cd>,
) -> ClusteringRestriction {
    let values = |cd: Cd| schema.ck_codec().inflate(cd.as_u64());
    ClusteringRestriction::Range {
        columns: schema
            .clustering_keys()
            .iter()
            .map(|c| c.name.clone())
            .collect(),
        lower: lower.map(values),
        upper: upper.map(values),
    }
}

fn named(columns: &[ColumnSpec], values: Vec<Value>) -> Vec<ColumnValue> {
    columns
        .iter()
        .map(|c| c.name.clone())
        .zip(values)
        .collect()
}

/// Select statement for `query`.
pub fn select(schema: &SchemaSpec, query: &Query) -> CompiledStatement {
    let clustering = match query.kind {
        QueryKind::SinglePartition => ClusteringRestriction::None,
        QueryKind::SingleRow(cd) => ClusteringRestriction::row(clustering_key(schema, cd)),
        QueryKind::ClusteringSlice(range) => clustering_range(schema, range.lower, range.upper),
    };
    CompiledStatement::Select {
        table: schema.qualified_name(),
        selection: selection(schema),
        partition: partition_key(schema, query.pd),
        clustering,
        order_by: schema
            .clustering_keys()
            .iter()
            .map(|c| c.name.clone())
            .collect(),
        reverse: query.reverse,
    }
}

/// Builds selects and translates their rows for one run.
#[derive(Debug, Clone)]
pub struct SelectHelper {
    schema: Arc<SchemaSpec>,
    clock: Arc<dyn MonotonicClock>,
}

impl SelectHelper {
    pub fn new(schema: Arc<SchemaSpec>, clock: Arc<dyn MonotonicClock>) -> Self {
        Self { schema, clock }
    }

    pub fn select(&self, query: &Query) -> CompiledStatement {
        select(&self.schema, query)
    }

    /// Executes `query` and translates every returned row.
    pub fn execute(
        &self,
        sut: &dyn SystemUnderTest,
        query: &Query,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<ResultSetRow>, CorruptionError> {
        let rows = sut.execute(&self.select(query), consistency)?;
        let translated = rows
            .iter()
            .map(|row| self.to_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(translated)
    }

    /// Translates a raw row laid out as described in the module docs.
    pub fn to_row(&self, raw: &Row) -> Result<ResultSetRow, TranslationError> {
        let schema = &*self.schema;
        let (pks, cks) = (schema.partition_keys(), schema.clustering_keys());
        let (statics, regulars) = (schema.statics(), schema.regulars());
        let expected = pks.len() + cks.len() + 2 * (statics.len() + regulars.len());
        if raw.len() != expected {
            return Err(TranslationError::Arity {
                expected,
                actual: raw.len(),
            });
        }

        let (pk_cells, rest) = raw.split_at(pks.len());
        let (ck_cells, rest) = rest.split_at(cks.len());
        let (static_cells, rest) = rest.split_at(statics.len());
        let (regular_cells, rest) = rest.split_at(regulars.len());
        let (static_times, regular_times) = rest.split_at(statics.len());

        let pk_values = required(pks, pk_cells)?;
        let pd = schema
            .pk_codec()
            .deflate(&pk_values)
            .ok_or_else(|| undecodable(pks, &pk_values))?;

        let cd = if cks.is_empty() {
            Some(Cd::new(0))
        } else if ck_cells.iter().all(Option::is_none) {
            None
        } else {
            let ck_values = required(cks, ck_cells)?;
            let cd = schema
                .ck_codec()
                .deflate(&ck_values)
                .ok_or_else(|| undecodable(cks, &ck_values))?;
            Some(Cd::new(cd))
        };

        Ok(ResultSetRow {
            pd: Pd::new(pd),
            cd,
            sds: descriptors(statics, static_cells)?,
            vds: descriptors(regulars, regular_cells)?,
            slts: self.write_times(statics, static_times)?,
            lts: self.write_times(regulars, regular_times)?,
        })
    }

    fn write_times(
        &self,
        columns: &[ColumnSpec],
        cells: &[Option<Value>],
    ) -> Result<Vec<Option<Lts>>, TranslationError> {
        columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| {
                let Some(value) = cell else {
                    return Ok(None);
                };
                let rts = value.as_i64().ok_or_else(|| TranslationError::Undecodable {
                    column: format!("writetime({})", column.name),
                    value: value.to_string(),
                })?;
                let out_of_range = || TranslationError::TimestampOutOfRange {
                    column: column.name.clone(),
                    rts,
                };
                let rts = u64::try_from(rts).map_err(|_| out_of_range())?;
                self.clock
                    .lts(Rts::new(rts))
                    .map(Some)
                    .ok_or_else(out_of_range)
            })
            .collect()
    }
}

fn required(columns: &[ColumnSpec], cells: &[Option<Value>]) -> Result<Vec<Value>, TranslationError> {
    columns
        .iter()
        .zip(cells)
        .map(|(column, cell)| {
            cell.clone().ok_or_else(|| TranslationError::UnexpectedNull {
                column: column.name.clone(),
            })
        })
        .collect()
}

fn descriptors(
    columns: &[ColumnSpec],
    cells: &[Option<Value>],
) -> Result<Vec<Option<u64>>, TranslationError> {
    columns
        .iter()
        .zip(cells)
        .map(|(column, cell)| match cell {
            None => Ok(None),
            Some(value) => column
                .data_type
                .deflate(value)
                .map(Some)
                .ok_or_else(|| TranslationError::Undecodable {
                    column: column.name.clone(),
                    value: value.to_string(),
                }),
        })
        .collect()
}

fn undecodable(columns: &[ColumnSpec], values: &[Value]) -> TranslationError {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let values: Vec<String> = values.iter().map(ToString::to_string).collect();
    TranslationError::Undecodable {
        column: names.join(", "),
        value: values.join(", "),
    }
}
