//! In-memory reference implementation of the storage contract.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use varspace_core::{Environment, Result, Variable};

use crate::{next_revision, VariablesStore};

#[derive(Default)]
struct Inner {
    environments: Vec<Environment>,
    variables: Vec<Variable>,
}

/// A `VariablesStore` backed by process memory.
///
/// Records keep insertion order, mirroring the listing order a document
/// store gives back. Intended for tests and embedding demos, not for
/// durability.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist an environment record under `name`, assigning identifiers.
    pub fn insert_environment(&self, name: impl Into<String>) -> Environment {
        let mut record = Environment::new(name);
        record.id = Some(Uuid::new_v4().to_string());
        record.rev = Some(next_revision(None));
        let mut inner = self.inner.lock();
        inner.environments.push(record.clone());
        record
    }

    /// Seed variable records, assigning identifiers where absent.
    pub fn seed_variables(&self, variables: impl IntoIterator<Item = Variable>) -> Vec<Variable> {
        let mut inner = self.inner.lock();
        variables
            .into_iter()
            .map(|mut variable| {
                if variable.id.is_none() {
                    variable.id = Some(Uuid::new_v4().to_string());
                }
                if variable.rev.is_none() {
                    variable.rev = Some(next_revision(None));
                }
                inner.variables.push(variable.clone());
                variable
            })
            .collect()
    }

    /// Replace an environment record in place, bumping its revision.
    pub fn replace_environment(&self, record: Environment) -> Option<Environment> {
        let mut inner = self.inner.lock();
        let slot = inner
            .environments
            .iter_mut()
            .find(|existing| existing.id == record.id)?;
        let mut updated = record;
        updated.rev = Some(next_revision(slot.rev.as_deref()));
        *slot = updated.clone();
        Some(updated)
    }

    /// Remove an environment record by id.
    pub fn remove_environment(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.environments.len();
        inner
            .environments
            .retain(|record| record.id.as_deref() != Some(id));
        inner.environments.len() != before
    }

    /// Remove a variable record by id.
    pub fn remove_variable(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.variables.len();
        inner
            .variables
            .retain(|record| record.id.as_deref() != Some(id));
        inner.variables.len() != before
    }
}

#[async_trait]
impl VariablesStore for MemoryStore {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        Ok(self.inner.lock().environments.clone())
    }

    async fn list_variables(&self, environment: &str) -> Result<Vec<Variable>> {
        Ok(self
            .inner
            .lock()
            .variables
            .iter()
            .filter(|variable| variable.environment == environment)
            .cloned()
            .collect())
    }

    async fn update_variable(&self, mut variable: Variable) -> Result<Variable> {
        let mut inner = self.inner.lock();
        match variable.id.clone() {
            Some(id) => {
                variable.rev = Some(next_revision(variable.rev.as_deref()));
                if let Some(slot) = inner
                    .variables
                    .iter_mut()
                    .find(|existing| existing.id.as_deref() == Some(id.as_str()))
                {
                    *slot = variable.clone();
                } else {
                    inner.variables.push(variable.clone());
                }
                debug!(id = %id, name = %variable.name, "updated variable record");
            }
            None => {
                variable.id = Some(Uuid::new_v4().to_string());
                variable.rev = Some(next_revision(None));
                inner.variables.push(variable.clone());
                debug!(name = %variable.name, "created variable record");
            }
        }
        Ok(variable)
    }
}
