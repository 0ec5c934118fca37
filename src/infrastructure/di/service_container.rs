//! Service container for dependency injection
//!
//! Wires settings, storage, clock and the aggregate catalog together.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{AggregateForm, ThemeService};
use crate::application::ApplicationError;
use crate::catalog;
use crate::config::Settings;
use crate::domain::{CompositeRegistry, EntityId};
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::json_store::JsonFileStore;
use crate::infrastructure::traits::{Clock, Storage, SystemClock};

/// Container holding all application collaborators.
pub struct ServiceContainer {
    pub settings: Arc<Settings>,
    pub storage: Arc<dyn Storage>,
    pub clock: Arc<dyn Clock>,
    /// Every aggregate declaration, checked against the schemas once.
    pub registry: Arc<CompositeRegistry>,
}

impl ServiceContainer {
    /// Create a container over the JSON file store named in `settings`.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let storage = JsonFileStore::open(&settings.store_path)?;
        Self::with_deps(settings, Arc::new(storage), Arc::new(SystemClock))
    }

    /// Create a container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> InfraResult<Self> {
        let registry = catalog::build_registry().map_err(ApplicationError::from)?;
        debug!("container: {} aggregates", registry.names().count());
        Ok(Self {
            settings: Arc::new(settings),
            storage,
            clock,
            registry: Arc::new(registry),
        })
    }

    /// Load a form over `aggregate`, for a create (`None`) or an update.
    pub fn form(&self, aggregate: &str, root_id: Option<&EntityId>) -> InfraResult<AggregateForm> {
        let definition = self
            .registry
            .get(aggregate)
            .map_err(ApplicationError::from)?
            .clone();
        let form = AggregateForm::load(definition, root_id, self.storage.clone(), self.clock.clone())?;
        Ok(form)
    }

    pub fn theme(&self) -> ThemeService {
        ThemeService::new(&self.settings.theme_path)
    }
}
