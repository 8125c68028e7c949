//! Deletes a live row.

use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::ConsistencyLevel;
use rand::rngs::SmallRng;

use super::RowCorruptor;
use crate::clock::MonotonicClock;
use crate::error::CorruptionError;
use crate::row::ResultSetRow;
use crate::sut::SystemUnderTest;
use crate::write_helper::WriteHelper;

/// Deletes the row one microsecond after its newest regular cell.
#[derive(Debug, Clone)]
pub struct HideRowCorruptor {
    clock: Arc<dyn MonotonicClock>,
    write_helper: WriteHelper,
}

impl HideRowCorruptor {
    pub fn new(schema: Arc<SchemaSpec>, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            clock,
            write_helper: WriteHelper::new(schema),
        }
    }
}

impl RowCorruptor for HideRowCorruptor {
    fn maybe_corrupt(
        &self,
        row: &ResultSetRow,
        _rng: &mut SmallRng,
        sut: &dyn SystemUnderTest,
    ) -> Result<bool, CorruptionError> {
        // A row kept alive only by its marker has no write time to beat.
        let (Some(cd), Some(lts)) = (row.cd, row.max_regular_lts()) else {
            return Ok(false);
        };
        let rts = self.clock.rts(lts).successor();
        tracing::info!(pd = %row.pd, %cd, %rts, "corrupting partition: hiding row");
        sut.execute(
            &self.write_helper.delete_row(row.pd, cd, rts),
            ConsistencyLevel::All,
        )?;
        Ok(true)
    }
}
