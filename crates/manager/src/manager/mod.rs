//! The `VariablesManager` component.

mod handlers;
mod reconcile;
mod state;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use varspace_core::{
    AnalyticsReport, BusEvent, EventBus, InstanceId, SinkId, SystemVariables, Variable,
    DEFAULT_ENVIRONMENT,
};
use varspace_store::VariablesStore;

use state::{ReconcileRequest, State};

/// Configuration surface of a manager instance.
#[derive(Debug, Default, Clone)]
pub struct ManagerOptions {
    /// Initial environment selection. When absent the instance negotiates
    /// with siblings during [`VariablesManager::initialize`].
    pub environment: Option<String>,
    /// Initial system-variable map.
    pub system_variables: Option<SystemVariables>,
    /// Initial in-memory overrides.
    pub in_memory_variables: Vec<Variable>,
    /// Exclude system variables from the merged list.
    pub sys_variables_disabled: bool,
    /// Exclude persisted app variables from the merged list.
    pub app_variables_disabled: bool,
}

/// Manager for environments and variables.
///
/// Owns the selected-environment value, the cached persisted-variable list,
/// the in-memory overrides, and the system-variable entries; everything else
/// is reached over the event bus or the storage contract. Mutation is
/// cooperative: setters and bus handlers only update state and mark dirty
/// flags, and a [`settle`](Self::settle) pass performs the deferred
/// reconciliation, reload, and broadcast work. Any number of synchronous
/// mutations between two settles coalesce.
pub struct VariablesManager {
    id: InstanceId,
    bus: Arc<EventBus>,
    store: Arc<dyn VariablesStore>,
    state: Mutex<State>,
    sink: OnceCell<SinkId>,
}

impl VariablesManager {
    /// Create a manager and attach it to the bus.
    pub fn new(
        bus: Arc<EventBus>,
        store: Arc<dyn VariablesStore>,
        options: ManagerOptions,
    ) -> Arc<Self> {
        let mut state = State {
            environment: options.environment,
            system_map: options.system_variables,
            in_memory: options.in_memory_variables,
            sys_disabled: options.sys_variables_disabled,
            app_disabled: options.app_variables_disabled,
            ..State::default()
        };
        state.recompute_system_entries();

        let this = Arc::new(Self {
            id: InstanceId::new(),
            bus: bus.clone(),
            store,
            state: Mutex::new(state),
            sink: OnceCell::new(),
        });
        let sink = bus.attach(Arc::downgrade(&this));
        let _ = this.sink.set(sink);
        debug!(instance = %this.id, "variables manager attached");
        this
    }

    /// This instance's identity on the bus.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Detach from the bus. The instance stops observing and answering
    /// events; its cached state stays readable.
    pub fn detach(&self) -> bool {
        self.sink
            .get()
            .map(|sink| self.bus.detach(*sink))
            .unwrap_or(false)
    }

    /// Raw selected environment; `None` until negotiated or set.
    #[must_use]
    pub fn environment(&self) -> Option<String> {
        self.state.lock().environment.clone()
    }

    /// Selected environment with the implicit `"default"` applied.
    #[must_use]
    pub fn active_environment(&self) -> String {
        self.state.lock().active_environment()
    }

    /// Whether the first reconciliation has completed.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Cached record of the selected environment, absent while `default` is
    /// selected or the record has not been resolved yet.
    #[must_use]
    pub fn environment_record(&self) -> Option<varspace_core::Environment> {
        self.state.lock().env_record.clone()
    }

    /// Cached persisted variables, `None` while unloaded or while app
    /// variables are disabled.
    #[must_use]
    pub fn variables(&self) -> Option<Vec<Variable>> {
        let state = self.state.lock();
        if state.app_disabled {
            None
        } else {
            state.app_vars.clone()
        }
    }

    #[must_use]
    pub fn in_memory_variables(&self) -> Vec<Variable> {
        self.state.lock().in_memory.clone()
    }

    /// Replace the transient overrides wholesale.
    pub fn set_in_memory_variables(&self, variables: Vec<Variable>) {
        let mut state = self.state.lock();
        if state.in_memory == variables {
            return;
        }
        state.in_memory = variables;
        state.mark_notify();
    }

    #[must_use]
    pub fn system_variables(&self) -> Option<SystemVariables> {
        self.state.lock().system_map.clone()
    }

    pub fn set_system_variables(&self, map: Option<SystemVariables>) {
        let mut state = self.state.lock();
        if state.system_map == map {
            return;
        }
        state.system_map = map;
        let before = std::mem::take(&mut state.system_entries);
        state.recompute_system_entries();
        if state.system_entries != before {
            state.mark_notify();
        }
    }

    #[must_use]
    pub fn sys_variables_disabled(&self) -> bool {
        self.state.lock().sys_disabled
    }

    pub fn set_sys_variables_disabled(&self, disabled: bool) {
        let mut state = self.state.lock();
        if state.sys_disabled == disabled {
            return;
        }
        state.sys_disabled = disabled;
        let before = std::mem::take(&mut state.system_entries);
        state.recompute_system_entries();
        if state.system_entries != before {
            state.mark_notify();
        }
    }

    #[must_use]
    pub fn app_variables_disabled(&self) -> bool {
        self.state.lock().app_disabled
    }

    pub fn set_app_variables_disabled(&self, disabled: bool) {
        let mut state = self.state.lock();
        if state.app_disabled == disabled {
            return;
        }
        state.app_disabled = disabled;
        state.mark_notify();
    }

    /// The merged app + override + system list, combined on demand.
    #[must_use]
    pub fn list_all_variables(&self) -> Vec<Variable> {
        self.state.lock().combined()
    }

    /// Select an environment.
    ///
    /// The value is observable immediately; cache invalidation, the change
    /// broadcast, and the variable reload are deferred to the next
    /// [`settle`](Self::settle) pass, and repeated synchronous assignments
    /// collapse into a single reconciliation.
    pub fn set_environment(&self, value: impl Into<String>) {
        let value = value.into();
        let mut state = self.state.lock();
        if state.environment.as_deref() == Some(value.as_str()) {
            return;
        }
        state.environment = Some(value.clone());
        let suppress = state.suppress_broadcast;
        match &mut state.pending.reconcile {
            Some(request) => {
                request.environment = value;
                request.suppress = suppress;
            }
            None => {
                state.pending.reconcile = Some(ReconcileRequest {
                    environment: value,
                    suppress,
                });
            }
        }
    }

    /// Negotiate the startup environment and run the first reconciliation.
    ///
    /// When no environment was pre-set this broadcasts the
    /// `environment-current` query exactly once; an answering sibling's
    /// environment and in-memory overrides are adopted, otherwise the
    /// selection falls back to `"default"`. Idempotent: later calls are
    /// no-ops.
    pub async fn initialize(&self) {
        let preset = {
            let mut state = self.state.lock();
            if state.negotiated {
                return;
            }
            state.negotiated = true;
            state.environment.clone()
        };

        match preset {
            Some(environment) => {
                let mut state = self.state.lock();
                let suppress = state.suppress_broadcast;
                state.pending.reconcile = Some(ReconcileRequest {
                    environment,
                    suppress,
                });
            }
            None => {
                let mut query = BusEvent::EnvironmentCurrent {
                    origin: self.id,
                    answer: None,
                };
                self.bus.publish(&mut query);
                let answer = match query {
                    BusEvent::EnvironmentCurrent { answer, .. } => answer,
                    _ => None,
                };
                match answer {
                    Some(current) => {
                        debug!(
                            instance = %self.id,
                            environment = %current.environment,
                            "adopted environment from sibling"
                        );
                        self.state.lock().in_memory = current.in_memory;
                        self.set_environment(current.environment);
                    }
                    None => self.set_environment(DEFAULT_ENVIRONMENT),
                }
            }
        }

        self.settle().await;
    }

    /// Create-or-update a variable by name in the active environment,
    /// persisting it through the storage collaborator.
    pub async fn store_variable(
        &self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> varspace_core::Result<Variable> {
        let receiver = self.begin_store_variable(name.into(), value.into());
        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(varspace_core::Error::channel_closed("variable store action")),
        }
    }

    /// Insert-or-update a transient override at universal scope, with no
    /// storage call, and broadcast the recombined list immediately.
    pub fn apply_transient(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        {
            let mut state = self.state.lock();
            if let Some(slot) = state.in_memory.iter_mut().find(|entry| entry.name == name) {
                slot.value = value;
            } else {
                state.in_memory.push(Variable::universal(name, value));
            }
        }
        self.notify_variables_changed();
    }

    /// Broadcast the current merged list.
    pub(crate) fn notify_variables_changed(&self) {
        let (value, environment) = {
            let state = self.state.lock();
            (state.combined(), state.active_environment())
        };
        self.bus.publish(&mut BusEvent::VariablesListChanged {
            origin: self.id,
            value,
            environment,
        });
    }

    /// Report a recovered storage failure: structured log plus a non-fatal
    /// analytics event for the hosting application.
    pub(crate) fn report_failure(&self, description: String) {
        warn!(instance = %self.id, description = %description, "storage failure");
        self.bus.publish(&mut BusEvent::AnalyticsReported {
            report: AnalyticsReport::exception(description),
        });
    }
}
