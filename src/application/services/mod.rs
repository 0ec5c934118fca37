//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (Storage, Clock)
//! but are themselves concrete structs, not traits.

mod aggregate_form;
mod cascade;
mod initializer;
mod persistence;
mod theme;

pub use aggregate_form::{AggregateForm, Listable, Persistable, SubmitOutcome, Validatable};
pub use cascade::BindValidateService;
pub use initializer::AggregateInitializer;
pub use persistence::{CommittedAggregate, PersistenceOrchestrator};
pub use theme::ThemeService;
