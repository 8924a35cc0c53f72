//! Mutable per-instance state, guarded by one mutex on the manager.

use varspace_core::{Environment, SystemVariables, Variable, DEFAULT_ENVIRONMENT};

use crate::combiner;

/// One scheduled environment reconciliation.
///
/// The suppression state at assignment time travels with the request, so a
/// value adopted from a sibling broadcast never echoes back onto the bus no
/// matter when the reconciliation actually runs.
#[derive(Debug, Clone)]
pub(crate) struct ReconcileRequest {
    pub environment: String,
    pub suppress: bool,
}

/// Dirty flags drained by a single `settle` pass, in priority order.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    pub reconcile: Option<ReconcileRequest>,
    pub reload: bool,
    pub notify: bool,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    /// Raw selected-environment value; `None` until negotiated or set.
    pub environment: Option<String>,
    /// Cached record of the selected environment, absent for `default`.
    pub env_record: Option<Environment>,
    /// Cached persisted variables for the selected environment. `None` means
    /// "never loaded", distinct from a loaded empty list.
    pub app_vars: Option<Vec<Variable>>,
    /// Transient overrides, universal scope, never persisted.
    pub in_memory: Vec<Variable>,
    pub system_map: Option<SystemVariables>,
    /// Entries generated from `system_map`, empty while disabled.
    pub system_entries: Vec<Variable>,
    pub sys_disabled: bool,
    pub app_disabled: bool,
    pub initialized: bool,
    /// The startup negotiation ran; it must never run twice.
    pub negotiated: bool,
    /// Set while adopting an environment from a sibling broadcast.
    pub suppress_broadcast: bool,
    pub pending: Pending,
}

impl State {
    /// Selected environment with the implicit default applied.
    pub(crate) fn active_environment(&self) -> String {
        self.environment
            .clone()
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }

    /// The externally observable merged list.
    pub(crate) fn combined(&self) -> Vec<Variable> {
        combiner::combine(
            self.app_vars.as_deref(),
            &self.in_memory,
            &self.system_entries,
            self.app_disabled,
        )
    }

    /// Schedule a combined-list broadcast. Quiet before first initialization.
    pub(crate) fn mark_notify(&mut self) {
        if self.initialized {
            self.pending.notify = true;
        }
    }

    pub(crate) fn recompute_system_entries(&mut self) {
        self.system_entries = combiner::system_entries(self.system_map.as_ref(), self.sys_disabled);
    }
}
