//! The validation path: read, translate, hand to a model.

use std::sync::Arc;

use harrow_types::ConsistencyLevel;

use crate::corruptor::QueryResponseCorruptor;
use crate::error::{ModelError, ValidationError};
use crate::query::Query;
use crate::row::ResultSetRow;
use crate::select_helper::SelectHelper;
use crate::sut::SystemUnderTest;

/// Decides whether observed rows are explained by the descriptor stream.
///
/// Model checkers live outside the core and plug in here.
pub trait Model: Send + Sync {
    fn validate(&self, query: &Query, rows: &[ResultSetRow]) -> Result<(), ModelError>;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpModel;

impl Model for NoOpModel {
    fn validate(&self, _query: &Query, _rows: &[ResultSetRow]) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Rows a validation observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Whether a corruptor wrote to the partition before the read.
    pub corrupted: bool,
    pub rows: Vec<ResultSetRow>,
}

/// Reads queries at ALL and checks them against a model, optionally
/// corrupting the partition first.
pub struct Validator<M> {
    select_helper: SelectHelper,
    sut: Arc<dyn SystemUnderTest>,
    model: M,
    corruptor: Option<Box<dyn QueryResponseCorruptor>>,
}

impl<M: Model> Validator<M> {
    pub fn new(select_helper: SelectHelper, sut: Arc<dyn SystemUnderTest>, model: M) -> Self {
        Self {
            select_helper,
            sut,
            model,
            corruptor: None,
        }
    }

    /// Corrupts each validated partition before reading it.
    #[must_use]
    pub fn with_corruptor(mut self, corruptor: Box<dyn QueryResponseCorruptor>) -> Self {
        self.corruptor = Some(corruptor);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn validate(&self, query: &Query) -> Result<Validation, ValidationError> {
        let corrupted = match &self.corruptor {
            Some(corruptor) => corruptor.maybe_corrupt(query, &*self.sut)?,
            None => false,
        };

        let raw = self
            .sut
            .execute(&self.select_helper.select(query), ConsistencyLevel::All)?;
        let rows = raw
            .iter()
            .map(|row| self.select_helper.to_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(pd = %query.pd, rows = rows.len(), corrupted, "validating query");

        self.model.validate(query, &rows)?;
        Ok(Validation { corrupted, rows })
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for Validator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("model", &self.model)
            .field("corrupts", &self.corruptor.is_some())
            .finish_non_exhaustive()
    }
}
