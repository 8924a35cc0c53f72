//! Storage boundary for the `varspace` workspace.
//!
//! Durable environment and variable records are owned by an external
//! document store; everything above it consumes the records through the
//! [`VariablesStore`] contract. The crate also ships [`MemoryStore`], an
//! in-memory implementation used by tests and embedding demos.

mod memory;

use async_trait::async_trait;

use varspace_core::{Environment, Result, Variable};

pub use memory::MemoryStore;

/// Async contract over the persistent variables store.
///
/// All calls may suspend the caller; failures surface as
/// [`varspace_core::Error::StorageRead`] / [`varspace_core::Error::StorageWrite`]
/// and are recovered by the caller, never propagated as panics.
#[async_trait]
pub trait VariablesStore: Send + Sync {
    /// List every persisted environment record.
    async fn list_environments(&self) -> Result<Vec<Environment>>;

    /// List the variables belonging to `environment`, in storage order.
    async fn list_variables(&self, environment: &str) -> Result<Vec<Variable>>;

    /// Create or update a variable record.
    ///
    /// The returned record always carries an identifier and a fresh revision
    /// marker.
    async fn update_variable(&self, variable: Variable) -> Result<Variable>;
}

/// Compute the revision marker that follows `previous`.
///
/// Markers take the `{generation}-{nonce}` shape; an unparsable or absent
/// previous marker restarts the generation counter.
#[must_use]
pub fn next_revision(previous: Option<&str>) -> String {
    let generation = previous
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{generation}-{}", &nonce[..12])
}
