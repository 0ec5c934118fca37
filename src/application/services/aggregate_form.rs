//! One bind-validate-persist cycle over one aggregate
//!
//! `AggregateForm` composes the initializer, the cascade and the
//! orchestrator behind three small traits instead of stacking behaviour.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{
    AggregateInitializer, BindValidateService, CommittedAggregate, PersistenceOrchestrator,
};
use crate::application::ApplicationResult;
use crate::domain::{AggregateDefinition, BoundAggregate, DetailRows, EntityId, InitialValues, Submission};
use crate::infrastructure::traits::{Clock, Storage};

/// Bind a submission and report errors, without side effects.
pub trait Validatable {
    fn validate(&self, submission: &Submission) -> BoundAggregate;
}

/// Commit a validated aggregate.
pub trait Persistable {
    fn persist(&self, aggregate: BoundAggregate) -> ApplicationResult<CommittedAggregate>;
}

/// Describe the aggregate for display.
pub trait Listable {
    fn initial(&self) -> &InitialValues;
    fn details(&self) -> DetailRows<'_>;
}

/// Result of [`AggregateForm::submit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Returned for re-display with every error attached.
    Invalid(BoundAggregate),
    Saved(CommittedAggregate),
}

pub struct AggregateForm {
    definition: AggregateDefinition,
    initial: InitialValues,
    cascade: BindValidateService,
    orchestrator: PersistenceOrchestrator,
}

impl AggregateForm {
    /// Load the initial snapshot for `root_id` (or defaults for a create).
    pub fn load(
        definition: AggregateDefinition,
        root_id: Option<&EntityId>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> ApplicationResult<Self> {
        let initial = AggregateInitializer::new(storage.clone(), clock.clone()).initial(&definition, root_id)?;
        Ok(Self {
            definition,
            initial,
            cascade: BindValidateService::new(clock),
            orchestrator: PersistenceOrchestrator::new(storage),
        })
    }

    pub fn definition(&self) -> &AggregateDefinition {
        &self.definition
    }

    /// Validate, then persist only when valid.
    pub fn submit(&self, submission: &Submission) -> ApplicationResult<SubmitOutcome> {
        let aggregate = self.validate(submission);
        if !aggregate.is_valid() {
            debug!("submit: {} errors", aggregate.report.error_count());
            return Ok(SubmitOutcome::Invalid(aggregate));
        }
        self.persist(aggregate).map(SubmitOutcome::Saved)
    }
}

impl Validatable for AggregateForm {
    fn validate(&self, submission: &Submission) -> BoundAggregate {
        self.cascade.bind(&self.definition, &self.initial, submission)
    }
}

impl Persistable for AggregateForm {
    fn persist(&self, aggregate: BoundAggregate) -> ApplicationResult<CommittedAggregate> {
        self.orchestrator.persist(&self.definition, aggregate)
    }
}

impl Listable for AggregateForm {
    fn initial(&self) -> &InitialValues {
        &self.initial
    }

    fn details(&self) -> DetailRows<'_> {
        DetailRows::new(&self.definition, &self.initial)
    }
}
