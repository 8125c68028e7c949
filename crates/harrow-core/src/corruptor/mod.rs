//! Fault injection against the system under test.
//!
//! A corruptor inspects what a query currently returns and, when it can,
//! writes to the store so the next read diverges from what the descriptor
//! stream explains. Running the validation path after a successful
//! corruption checks that the model notices.
//!
//! Corruptors return `Ok(false)` when there is nothing they can corrupt;
//! that is a skip, not a failure. Store errors propagate unchanged.
//!
//! Corruptors read and then write based on that snapshot. Callers must not
//! mutate the same partition concurrently while a corruptor runs.

mod add_extra_row;
mod change_value;
mod hide_row;
mod hide_value;
mod single_row;

pub use add_extra_row::{AddExtraRowCorruptor, CdSearch, MAX_SEARCH_ATTEMPTS, SearchState};
pub use change_value::ChangeValueCorruptor;
pub use hide_row::HideRowCorruptor;
pub use hide_value::HideValueCorruptor;
pub use single_row::SingleRowCorruptor;

use rand::rngs::SmallRng;

use crate::error::CorruptionError;
use crate::query::Query;
use crate::row::ResultSetRow;
use crate::sut::SystemUnderTest;

/// Corrupts the result of a whole query.
pub trait QueryResponseCorruptor: Send + Sync {
    /// Returns whether a corruption was written.
    fn maybe_corrupt(&self, query: &Query, sut: &dyn SystemUnderTest)
    -> Result<bool, CorruptionError>;
}

/// Corrupts a single observed row. Applied through [`SingleRowCorruptor`].
pub trait RowCorruptor: Send + Sync {
    /// Returns whether a corruption was written. `rng` is seeded per
    /// partition so runs stay reproducible.
    fn maybe_corrupt(
        &self,
        row: &ResultSetRow,
        rng: &mut SmallRng,
        sut: &dyn SystemUnderTest,
    ) -> Result<bool, CorruptionError>;
}
