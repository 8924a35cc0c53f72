//! Bus event handling: the synchronizer side of the component.
//!
//! Handlers run inside a bus dispatch, so they only mutate state and mark
//! dirty flags; the deferred work happens on the next `settle` pass. The one
//! exception is the store action, which spawns the storage write as a
//! background request-response.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use varspace_core::{
    BusEvent, CurrentEnvironment, EventSink, MutationPhase, Result, Variable, DEFAULT_ENVIRONMENT,
};

use super::VariablesManager;

impl VariablesManager {
    /// Begin a create-or-update of `name` in the active environment.
    ///
    /// Looks the record up by name in the cached list; a hit keeps every
    /// field except `value`, a miss constructs a fresh enabled record. The
    /// returned channel resolves to the persisted record; on success a
    /// committed `variable-updated` notice is broadcast first, so every
    /// instance (this one included) converges before the caller observes the
    /// result.
    pub(crate) fn begin_store_variable(
        &self,
        name: String,
        value: String,
    ) -> oneshot::Receiver<Result<Variable>> {
        let record = {
            let state = self.state.lock();
            match state
                .app_vars
                .as_ref()
                .and_then(|vars| vars.iter().find(|entry| entry.name == name))
            {
                Some(existing) => {
                    let mut record = existing.clone();
                    record.value = value;
                    record
                }
                None => Variable::new(name.clone(), value, state.active_environment()),
            }
        };

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let bus = self.bus.clone();
        tokio::spawn(async move {
            match store.update_variable(record).await {
                Ok(persisted) => {
                    bus.publish(&mut BusEvent::VariableUpdated {
                        phase: MutationPhase::Committed,
                        value: persisted.clone(),
                    });
                    let _ = sender.send(Ok(persisted));
                }
                Err(error) => {
                    warn!(name = %name, error = %error, "variable store failed");
                    bus.publish(&mut BusEvent::AnalyticsReported {
                        report: varspace_core::AnalyticsReport::exception(format!(
                            "storing variable '{name}': {error}"
                        )),
                    });
                    let _ = sender.send(Err(error));
                }
            }
        });
        receiver
    }
}

impl EventSink for VariablesManager {
    fn name(&self) -> &'static str {
        "variables-manager"
    }

    fn on_event(&self, event: &mut BusEvent) {
        match event {
            // Negotiation query from a sibling. Answer only when nobody has,
            // and never answer our own query.
            BusEvent::EnvironmentCurrent { origin, answer } => {
                if *origin == self.id || answer.is_some() {
                    return;
                }
                let state = self.state.lock();
                *answer = Some(CurrentEnvironment {
                    environment: state.active_environment(),
                    variables: state.combined(),
                    in_memory: state.in_memory.clone(),
                });
            }

            // A sibling selected a new environment: adopt it without echoing
            // the broadcast back.
            BusEvent::SelectedEnvironmentChanged { origin, value } => {
                if *origin == self.id {
                    return;
                }
                let value = value.clone();
                self.state.lock().suppress_broadcast = true;
                self.set_environment(value);
                self.state.lock().suppress_broadcast = false;
            }

            BusEvent::VariableUpdated { phase, value } => {
                if *phase != MutationPhase::Committed {
                    return;
                }
                let mut state = self.state.lock();
                if state.environment.as_deref() != Some(value.environment.as_str()) {
                    return;
                }
                if let Some(vars) = state.app_vars.as_mut() {
                    if let Some(slot) = vars.iter_mut().find(|entry| entry.id == value.id) {
                        *slot = value.clone();
                    } else {
                        vars.push(value.clone());
                    }
                } else {
                    state.app_vars = Some(vec![value.clone()]);
                }
                state.mark_notify();
            }

            BusEvent::VariableDeleted { phase, id } => {
                if *phase != MutationPhase::Committed {
                    return;
                }
                let mut state = self.state.lock();
                if let Some(vars) = state.app_vars.as_mut() {
                    let before = vars.len();
                    vars.retain(|entry| entry.id.as_deref() != Some(id.as_str()));
                    if vars.len() != before {
                        state.mark_notify();
                    }
                }
            }

            // A rename of the cached environment record follows through to a
            // full re-selection under the new name.
            BusEvent::EnvironmentUpdated { phase, value } => {
                if *phase != MutationPhase::Committed {
                    return;
                }
                let follow = {
                    let mut state = self.state.lock();
                    let matches = state
                        .env_record
                        .as_ref()
                        .is_some_and(|record| record.id.is_some() && record.id == value.id);
                    if !matches {
                        return;
                    }
                    state.env_record = Some(value.clone());
                    if state.environment.as_deref() != Some(value.name.as_str()) {
                        Some(value.name.clone())
                    } else {
                        None
                    }
                };
                if let Some(name) = follow {
                    self.set_environment(name);
                }
            }

            BusEvent::EnvironmentDeleted { phase, id } => {
                if *phase != MutationPhase::Committed {
                    return;
                }
                let matched = {
                    let mut state = self.state.lock();
                    if state
                        .env_record
                        .as_ref()
                        .is_some_and(|record| record.id.as_deref() == Some(id.as_str()))
                    {
                        state.env_record = None;
                        true
                    } else {
                        false
                    }
                };
                if matched {
                    debug!(instance = %self.id, "selected environment deleted, resetting");
                    self.set_environment(DEFAULT_ENVIRONMENT);
                }
            }

            BusEvent::DataImported => {
                self.state.lock().pending.reload = true;
            }

            BusEvent::DatastoreDestroyed { datastore } => {
                if !datastore.targets_variables() {
                    return;
                }
                let reset = self.state.lock().active_environment() != DEFAULT_ENVIRONMENT;
                if reset {
                    // Selecting default triggers the full reload on settle.
                    self.set_environment(DEFAULT_ENVIRONMENT);
                } else {
                    self.state.lock().pending.reload = true;
                }
            }

            BusEvent::VariableStoreAction {
                name,
                value,
                result,
            } => {
                if result.is_some() {
                    return;
                }
                *result = Some(self.begin_store_variable(name.clone(), value.clone()));
            }

            BusEvent::VariableUpdateAction {
                name,
                value,
                claimed,
            } => {
                if *claimed {
                    return;
                }
                *claimed = true;
                self.apply_transient(name.clone(), value.clone());
            }

            // Emitted by this component, observed by the UI layer.
            BusEvent::VariablesListChanged { .. }
            | BusEvent::InitializedChanged { .. }
            | BusEvent::AnalyticsReported { .. } => {}
        }
    }
}
