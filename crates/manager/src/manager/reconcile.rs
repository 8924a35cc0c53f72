//! Deferred reconciliation: the cooperative scheduler tick, environment
//! settling, and the variable reload with its stale-response guard.

use tracing::debug;

use varspace_core::{BusEvent, DEFAULT_ENVIRONMENT};

use super::state::ReconcileRequest;
use super::VariablesManager;

enum Work {
    Reconcile(ReconcileRequest),
    Reload,
    Notify,
}

impl VariablesManager {
    /// Drain pending deferred work until quiescent.
    ///
    /// Work runs in priority order: a pending environment reconciliation
    /// subsumes a pending reload and a pending notification, a reload
    /// subsumes a notification. Handlers fired by the work performed here may
    /// mark new flags; the loop keeps draining until none remain.
    pub async fn settle(&self) {
        loop {
            let work = {
                let mut state = self.state.lock();
                if let Some(request) = state.pending.reconcile.take() {
                    state.pending.reload = false;
                    state.pending.notify = false;
                    Some(Work::Reconcile(request))
                } else if state.pending.reload {
                    state.pending.reload = false;
                    state.pending.notify = false;
                    Some(Work::Reload)
                } else if state.pending.notify {
                    state.pending.notify = false;
                    Some(Work::Notify)
                } else {
                    None
                }
            };
            match work {
                Some(Work::Reconcile(request)) => self.reconcile(request).await,
                Some(Work::Reload) => self.reload().await,
                Some(Work::Notify) => self.notify_variables_changed(),
                None => break,
            }
        }
    }

    /// Settle on a newly selected environment.
    ///
    /// Clears the caches, broadcasts the change unless the value was adopted
    /// from a sibling, resolves the environment record, reloads the variable
    /// list, and flips `initialized` exactly once.
    async fn reconcile(&self, request: ReconcileRequest) {
        debug!(
            instance = %self.id,
            environment = %request.environment,
            suppressed = request.suppress,
            "reconciling environment"
        );
        {
            let mut state = self.state.lock();
            state.app_vars = None;
            state.env_record = None;
        }

        if !request.suppress {
            self.bus.publish(&mut BusEvent::SelectedEnvironmentChanged {
                origin: self.id,
                value: request.environment.clone(),
            });
        }

        if request.environment.is_empty() {
            return;
        }

        let record = if request.environment == DEFAULT_ENVIRONMENT {
            None
        } else {
            match self.store.list_environments().await {
                Ok(environments) => environments
                    .into_iter()
                    .find(|environment| environment.name == request.environment),
                Err(error) => {
                    self.report_failure(format!("listing environments: {error}"));
                    None
                }
            }
        };
        self.state.lock().env_record = record;

        self.reload().await;

        let newly_initialized = {
            let mut state = self.state.lock();
            if state.initialized {
                false
            } else {
                state.initialized = true;
                true
            }
        };
        if newly_initialized {
            self.bus.publish(&mut BusEvent::InitializedChanged {
                origin: self.id,
                value: true,
            });
        }
    }

    /// Fetch the full variable list for the active environment.
    ///
    /// A response arriving after the active environment moved on is discarded
    /// silently. A failed fetch is reported and falls back to an empty list.
    /// Both completed paths conclude with the combined-list broadcast.
    pub(crate) async fn reload(&self) {
        let requested = self.state.lock().active_environment();
        let fetched = self.store.list_variables(&requested).await;
        let failure = fetched
            .as_ref()
            .err()
            .map(|error| format!("listing variables for '{requested}': {error}"));

        {
            let mut state = self.state.lock();
            if state.active_environment() != requested {
                debug!(
                    instance = %self.id,
                    requested = %requested,
                    "discarding stale variable list"
                );
                return;
            }
            state.app_vars = Some(fetched.unwrap_or_default());
        }

        if let Some(description) = failure {
            self.report_failure(description);
        }
        self.notify_variables_changed();
    }
}
