//! Injects a row no write explains.

use std::collections::HashSet;
use std::sync::Arc;

use harrow_schema::{KeyCodec, SchemaSpec};
use harrow_types::{Cd, ConsistencyLevel, Lts, OperationKind, Pd};

use super::QueryResponseCorruptor;
use crate::clock::MonotonicClock;
use crate::descriptor_selector::DescriptorSelector;
use crate::error::CorruptionError;
use crate::query::Query;
use crate::row;
use crate::select_helper::SelectHelper;
use crate::sut::SystemUnderTest;
use crate::write_helper::WriteHelper;

/// Advances from the initial draw before a search gives up. Counting the
/// initial draw, a search evaluates `MAX_SEARCH_ATTEMPTS + 1` candidates.
pub const MAX_SEARCH_ATTEMPTS: u64 = 1000;

/// State of a clustering descriptor search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// `candidate` was reached after `attempt` advances and is not yet
    /// evaluated.
    Searching { attempt: u64, candidate: Cd },
    Found(Cd),
    Exhausted,
}

/// Bounded search for a clustering descriptor the partition does not hold.
///
/// Candidates come from [`DescriptorSelector::random_cd`]. When the
/// partition already holds every cd the selector can produce, fresh draws
/// would only repeat occupied rows, so each rejected candidate is instead
/// advanced by adding a fresh draw to it, modulo the clustering domain.
///
/// The `n`-th advance draws `random_cd(pd, n)` counting from zero, so the
/// first advance reuses the initial draw. In a full partition that doubles
/// the initial candidate.
#[derive(Debug, Clone, Copy)]
pub struct CdSearch<'a> {
    selector: &'a dyn DescriptorSelector,
    ck_codec: &'a KeyCodec,
    pd: Pd,
    partition_is_full: bool,
}

impl<'a> CdSearch<'a> {
    pub fn new(
        selector: &'a dyn DescriptorSelector,
        ck_codec: &'a KeyCodec,
        pd: Pd,
        partition_is_full: bool,
    ) -> Self {
        Self {
            selector,
            ck_codec,
            pd,
            partition_is_full,
        }
    }

    pub fn start(&self) -> SearchState {
        SearchState::Searching {
            attempt: 0,
            candidate: self.selector.random_cd(self.pd, 0),
        }
    }

    /// The candidate following a rejected `current`, using the draw at
    /// `attempt`.
    pub fn next_candidate(&self, attempt: u64, current: Cd) -> Cd {
        let fresh = self.selector.random_cd(self.pd, attempt);
        if self.partition_is_full {
            Cd::new(
                self.ck_codec
                    .wrapping_add(current.as_u64(), fresh.as_u64()),
            )
        } else {
            fresh
        }
    }

    /// Evaluates the pending candidate.
    pub fn step(&self, state: SearchState, accept: impl Fn(Cd) -> bool) -> SearchState {
        match state {
            SearchState::Searching { attempt, candidate } => {
                if accept(candidate) {
                    SearchState::Found(candidate)
                } else if attempt >= MAX_SEARCH_ATTEMPTS {
                    SearchState::Exhausted
                } else {
                    SearchState::Searching {
                        attempt: attempt + 1,
                        candidate: self.next_candidate(attempt, candidate),
                    }
                }
            }
            done => done,
        }
    }

    /// Steps until the search finds a candidate or runs out of attempts.
    pub fn run(&self, accept: impl Fn(Cd) -> bool) -> SearchState {
        let mut state = self.start();
        while let SearchState::Searching { .. } = state {
            state = self.step(state, &accept);
        }
        state
    }
}

/// Writes a row that matches the query but was never generated.
///
/// The row is written at `rts(max_lts) + 1`, after every timestamp the
/// partition shows, so no in-flight legitimate write or earlier tombstone
/// can shadow it.
pub struct AddExtraRowCorruptor {
    schema: Arc<SchemaSpec>,
    clock: Arc<dyn MonotonicClock>,
    selector: Arc<dyn DescriptorSelector>,
    write_helper: WriteHelper,
    select_helper: SelectHelper,
}

impl AddExtraRowCorruptor {
    pub fn new(
        schema: Arc<SchemaSpec>,
        clock: Arc<dyn MonotonicClock>,
        selector: Arc<dyn DescriptorSelector>,
    ) -> Self {
        Self {
            write_helper: WriteHelper::new(Arc::clone(&schema)),
            select_helper: SelectHelper::new(Arc::clone(&schema), Arc::clone(&clock)),
            schema,
            clock,
            selector,
        }
    }
}

impl QueryResponseCorruptor for AddExtraRowCorruptor {
    fn maybe_corrupt(
        &self,
        query: &Query,
        sut: &dyn SystemUnderTest,
    ) -> Result<bool, CorruptionError> {
        let rows = self
            .select_helper
            .execute(sut, query, ConsistencyLevel::All)?;
        let observed: HashSet<Cd> = rows.iter().filter_map(|row| row.cd).collect();
        let max_lts = row::max_lts(&rows).unwrap_or(Lts::ZERO);
        let partition_is_full = observed.len() as u64 >= self.selector.max_partition_size();

        let search = CdSearch::new(
            &*self.selector,
            self.schema.ck_codec(),
            query.pd,
            partition_is_full,
        );
        let cd = match search.run(|cd| query.matches(cd) && !observed.contains(&cd)) {
            SearchState::Found(cd) => cd,
            _ => {
                tracing::debug!(pd = %query.pd, partition_is_full, "no free clustering descriptor to inject");
                return Ok(false);
            }
        };

        let vds = self
            .selector
            .vds(query.pd, cd, max_lts, 0, OperationKind::Insert);
        let rts = self.clock.rts(max_lts).successor();
        tracing::info!(pd = %query.pd, %cd, %rts, "corrupting partition: adding extra row");
        let statement = self.write_helper.insert(query.pd, cd, &vds, None, rts);
        sut.execute(&statement, ConsistencyLevel::All)?;
        Ok(true)
    }
}
