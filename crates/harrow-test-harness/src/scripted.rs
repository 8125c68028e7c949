//! A store that answers reads with fixed rows.

use std::sync::atomic::{AtomicBool, Ordering};

use harrow_core::{CompiledStatement, MonotonicClock, Row, SutError, SystemUnderTest};
use harrow_schema::{SchemaSpec, Value};
use harrow_types::{Cd, ConsistencyLevel, Lts, Pd};

/// Returns `rows` for every select and accepts every write without
/// applying it. Wrap in [`crate::RecordingSut`] to observe the writes.
#[derive(Debug, Default)]
pub struct ScriptedSut {
    rows: Vec<Row>,
    shutdown: AtomicBool,
}

impl ScriptedSut {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            shutdown: AtomicBool::new(false),
        }
    }
}

impl SystemUnderTest for ScriptedSut {
    fn execute(
        &self,
        statement: &CompiledStatement,
        _consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>, SutError> {
        if self.is_shutdown() {
            return Err(SutError::Shutdown);
        }
        if statement.is_write() {
            Ok(Vec::new())
        } else {
            Ok(self.rows.clone())
        }
    }

    fn schema_change(&self, _statement: &str) -> Result<(), SutError> {
        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn shutdown(&self) -> Result<(), SutError> {
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A raw select row for `(pd, cd)` with regular cells `(vd, lts)`, laid out
/// the way the select helper reads it. Statics are null; `None` cells are
/// null with no write time.
pub fn raw_row(
    schema: &SchemaSpec,
    clock: &dyn MonotonicClock,
    pd: Pd,
    cd: Cd,
    cells: &[Option<(u64, Lts)>],
) -> Row {
    let mut row: Row = schema
        .pk_codec()
        .inflate(pd.as_u64())
        .into_iter()
        .chain(schema.ck_codec().inflate(cd.as_u64()))
        .map(Some)
        .collect();
    row.extend(schema.statics().iter().map(|_| None));
    row.extend(schema.regulars().iter().zip(cells).map(|(column, cell)| {
        cell.map(|(vd, _)| column.data_type.inflate(vd))
    }));
    row.extend(schema.statics().iter().map(|_| None));
    row.extend(
        cells
            .iter()
            .map(|cell| cell.map(|(_, lts)| Value::BigInt(clock.rts(lts).as_i64()))),
    );
    row
}
