//! Overwrites one live regular cell.

use std::cmp::Ordering;
use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::ConsistencyLevel;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore};

use super::{MAX_SEARCH_ATTEMPTS, RowCorruptor};
use crate::clock::MonotonicClock;
use crate::error::CorruptionError;
use crate::row::ResultSetRow;
use crate::sut::SystemUnderTest;
use crate::write_helper::WriteHelper;

/// Rewrites a random regular cell at its own write timestamp.
///
/// On a timestamp tie the store keeps the lexicographically greater value,
/// so the replacement is drawn until it sorts after the current one.
#[derive(Debug, Clone)]
pub struct ChangeValueCorruptor {
    schema: Arc<SchemaSpec>,
    clock: Arc<dyn MonotonicClock>,
    write_helper: WriteHelper,
}

impl ChangeValueCorruptor {
    pub fn new(schema: Arc<SchemaSpec>, clock: Arc<dyn MonotonicClock>) -> Self {
        Self {
            write_helper: WriteHelper::new(Arc::clone(&schema)),
            schema,
            clock,
        }
    }
}

impl RowCorruptor for ChangeValueCorruptor {
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
            .filter_map(|(index, (vd, lts))| Some((index, (*vd)?, (*lts)?)))
            .collect();
        if written.is_empty() {
            return Ok(false);
        }

        let (column, current, lts) = written[rng.gen_range(0..written.len())];
        let Some(data_type) = self.schema.regulars().get(column).map(|c| &c.data_type) else {
            return Ok(false);
        };
        let replacement = (0..MAX_SEARCH_ATTEMPTS)
            .map(|_| data_type.adjust_entropy_domain(rng.next_u64()))
            .find(|&candidate| {
                data_type.compare_lexicographically(candidate, current) == Ordering::Greater
            });
        let Some(replacement) = replacement else {
            tracing::debug!(pd = %row.pd, %cd, column, "no greater value to write");
            return Ok(false);
        };

        let rts = self.clock.rts(lts);
        tracing::info!(pd = %row.pd, %cd, column, %rts, "corrupting partition: changing value");
        let statement = self
            .write_helper
            .update(row.pd, cd, &[(column, replacement)], &[], rts);
        sut.execute(&statement, ConsistencyLevel::All)?;
        Ok(true)
    }
}
