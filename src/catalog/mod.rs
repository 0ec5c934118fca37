//! Concrete polls declarations
//!
//! Every aggregate is checked against the entity schemas when the registry
//! is built, so a broken declaration fails at startup instead of on first use.

pub mod question;
pub mod schemas;
pub mod user;

use crate::domain::{CompositeRegistry, DomainError};

pub fn build_registry() -> Result<CompositeRegistry, DomainError> {
    let mut registry = CompositeRegistry::new(schemas::registry());
    registry.register(question::definition())?;
    registry.register(user::create_definition())?;
    registry.register(user::update_definition())?;
    Ok(registry)
}
