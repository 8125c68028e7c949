//! Deletes one live regular cell.

use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::{ColumnMask, ConsistencyLevel};
use rand::Rng;
use rand::rngs::SmallRng;

use super::RowCorruptor;
use crate::clock::MonotonicClock;
use crate::error::CorruptionError;
use crate::row::ResultSetRow;
use crate::sut::SystemUnderTest;
use crate::write_helper::WriteHelper;

/// Deletes a random written regular cell one microsecond after its write.
#[derive(Debug, Clone)]
pub struct HideValueCorruptor {
    clock: Arc<dyn MonotonicClock>,
    write_helper: WriteHelper,
}

impl HideValueCorruptor {
    pub fn new(schema: Arc<SchemaSpec>, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            clock,
            write_helper: WriteHelper::new(schema),
        }
    }
}

impl RowCorruptor for HideValueCorruptor {
    fn maybe_corrupt(
        &self,
        row: &ResultSetRow,
        rng: &mut SmallRng,
        sut: &dyn SystemUnderTest,
    ) -> Result<bool, CorruptionError> {
        let Some(cd) = row.cd else {
            return Ok(false);
        };
        let written: Vec<_> = row
            .vds
            .iter()
            .zip(&row.lts)
            .enumerate()
            .filter_map(|(index, (vd, lts))| vd.and(*lts).map(|lts| (index, lts)))
            .collect();
        if written.is_empty() {
            return Ok(false);
        }

        let (column, lts) = written[rng.gen_range(0..written.len())];
        let rts = self.clock.rts(lts).successor();
        tracing::info!(pd = %row.pd, %cd, column, %rts, "corrupting partition: hiding value");
        let statement = self.write_helper.delete_columns(
            row.pd,
            cd,
            ColumnMask::empty().with(column),
            ColumnMask::empty(),
            rts,
        );
        sut.execute(&statement, ConsistencyLevel::All)?;
        Ok(true)
    }
}
