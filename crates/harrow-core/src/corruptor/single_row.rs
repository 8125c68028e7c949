//! Applies a [`RowCorruptor`] to one row of a query result.

use std::sync::Arc;

use harrow_schema::SchemaSpec;
use harrow_types::ConsistencyLevel;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use super::{QueryResponseCorruptor, RowCorruptor};
use crate::clock::MonotonicClock;
use crate::error::CorruptionError;
use crate::query::Query;
use crate::select_helper::SelectHelper;
use crate::sut::SystemUnderTest;

/// Tries the wrapped row corruptor on each returned row, in an order drawn
/// from `seed ^ pd`, until one succeeds.
pub struct SingleRowCorruptor<R> {
    seed: u64,
    select_helper: SelectHelper,
    corruptor: R,
}

impl<R: RowCorruptor> SingleRowCorruptor<R> {
    pub fn new(
        seed: u64,
        schema: Arc<SchemaSpec>,
        clock: Arc<dyn MonotonicClock>,
        corruptor: R,
    ) -> Self {
        Self {
            seed,
            select_helper: SelectHelper::new(schema, clock),
            corruptor,
        }
    }
}

impl<R: RowCorruptor> QueryResponseCorruptor for SingleRowCorruptor<R> {
    fn maybe_corrupt(
        &self,
        query: &Query,
        sut: &dyn SystemUnderTest,
    ) -> Result<bool, CorruptionError> {
        let mut rows = self
            .select_helper
            .execute(sut, query, ConsistencyLevel::All)?;
        let mut rng = SmallRng::seed_from_u64(self.seed ^ query.pd.as_u64());
        rows.shuffle(&mut rng);
        for row in &rows {
            if self.corruptor.maybe_corrupt(row, &mut rng, sut)? {
                return Ok(true);
            }
        }
        tracing::debug!(pd = %query.pd, rows = rows.len(), "no row could be corrupted");
        Ok(false)
    }
}
