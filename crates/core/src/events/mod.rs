//! Event system for inter-instance communication.
//!
//! Every piece of coordination between manager instances (and between a
//! manager and the UI layer hosting it) crosses this bus as a typed event.
//! Delivery is synchronous and follows attachment order, which is what lets
//! a query be claimed by the first sink able to answer it.

mod bus;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::errors::Result;
use crate::types::{DatastoreScope, Environment, Variable};

pub use bus::{EventBus, EventSink, SinkId};

/// Identity of a single manager instance on the bus.
///
/// Events that need self-origin detection (echo suppression, skipping one's
/// own negotiation query) carry the originator's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Phase of a persisted-mutation notice.
///
/// `Requested` means somebody still has to persist the mutation; observers
/// that only mirror already-durable state must ignore it. `Committed` means
/// the record is durable and the notice is purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationPhase {
    Requested,
    Committed,
}

/// Answer payload of the startup environment negotiation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentEnvironment {
    /// Name of the responder's selected environment.
    pub environment: String,
    /// The responder's full merged variable list.
    pub variables: Vec<Variable>,
    /// The responder's transient in-memory overrides.
    pub in_memory: Vec<Variable>,
}

/// Category of an analytics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsKind {
    Exception,
}

/// Non-fatal error report for the hosting application's telemetry layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    #[serde(rename = "type")]
    pub kind: AnalyticsKind,
    pub description: String,
    pub fatal: bool,
}

impl AnalyticsReport {
    /// A non-fatal exception report.
    #[must_use]
    pub fn exception(description: impl Into<String>) -> Self {
        Self {
            kind: AnalyticsKind::Exception,
            description: description.into(),
            fatal: false,
        }
    }
}

/// All events exchanged on the bus.
///
/// Events are delivered mutably: queries are answered by filling their
/// payload in place, and request actions are claimed by attaching a result
/// channel or flipping the `claimed` flag. A sink that finds a query already
/// answered or an action already claimed must leave it alone.
#[derive(Debug)]
pub enum BusEvent {
    /// Startup negotiation: "does any sibling already have an environment
    /// selected?" The first sink able to answer fills `answer`.
    EnvironmentCurrent {
        origin: InstanceId,
        answer: Option<CurrentEnvironment>,
    },
    /// The originating instance selected a new environment.
    SelectedEnvironmentChanged { origin: InstanceId, value: String },
    /// The originating instance recombined its observable variable list.
    VariablesListChanged {
        origin: InstanceId,
        value: Vec<Variable>,
        environment: String,
    },
    /// An environment record changed in the store.
    EnvironmentUpdated {
        phase: MutationPhase,
        value: Environment,
    },
    /// An environment record was removed from the store.
    EnvironmentDeleted { phase: MutationPhase, id: String },
    /// A variable record changed in the store.
    VariableUpdated {
        phase: MutationPhase,
        value: Variable,
    },
    /// A variable record was removed from the store.
    VariableDeleted { phase: MutationPhase, id: String },
    /// Request to persist a value under `name` in the claimant's active
    /// environment. The claimant attaches the receiving half of a result
    /// channel that resolves to the persisted record.
    VariableStoreAction {
        name: String,
        value: String,
        result: Option<oneshot::Receiver<Result<Variable>>>,
    },
    /// Request to set a transient, in-memory-only override.
    VariableUpdateAction {
        name: String,
        value: String,
        claimed: bool,
    },
    /// The storage layer finished a bulk data import.
    DataImported,
    /// One or more datastores were destroyed.
    DatastoreDestroyed { datastore: DatastoreScope },
    /// Fired once per instance, on first successful reconciliation.
    InitializedChanged { origin: InstanceId, value: bool },
    /// Non-fatal error report.
    AnalyticsReported { report: AnalyticsReport },
}

impl BusEvent {
    /// Stable event name, used for log correlation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnvironmentCurrent { .. } => "environment-current",
            Self::SelectedEnvironmentChanged { .. } => "selected-environment-changed",
            Self::VariablesListChanged { .. } => "variables-list-changed",
            Self::EnvironmentUpdated { .. } => "environment-updated",
            Self::EnvironmentDeleted { .. } => "environment-deleted",
            Self::VariableUpdated { .. } => "variable-updated",
            Self::VariableDeleted { .. } => "variable-deleted",
            Self::VariableStoreAction { .. } => "variable-store-action",
            Self::VariableUpdateAction { .. } => "variable-update-action",
            Self::DataImported => "data-imported",
            Self::DatastoreDestroyed { .. } => "datastore-destroyed",
            Self::InitializedChanged { .. } => "initialized-changed",
            Self::AnalyticsReported { .. } => "send-analytics",
        }
    }
}
