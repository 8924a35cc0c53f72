//! Manager for environments and variables.
//!
//! One [`VariablesManager`] instance per logical UI surface. Instances
//! coordinate exclusively over the [`varspace_core::EventBus`]: on startup an
//! instance negotiates the selected environment with its siblings, afterwards
//! it keeps a cached variable list consistent with external mutation notices
//! and broadcasts a recombined observable list whenever its inputs change.
//!
//! Durable records are owned by the storage collaborator behind
//! [`varspace_store::VariablesStore`]; the manager owns only its caches, its
//! transient in-memory overrides, and the selected-environment value.

pub mod combiner;
mod manager;

pub use combiner::{combine, system_entries};
pub use manager::{ManagerOptions, VariablesManager};
