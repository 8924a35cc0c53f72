//! Shared fixtures for the manager integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

use varspace_core::{BusEvent, Environment, Error, EventBus, EventSink, Result, Variable};
use varspace_store::{MemoryStore, VariablesStore};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Lightweight snapshot of an observed event.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    EnvironmentCurrent,
    SelectedEnvironmentChanged { value: String },
    VariablesListChanged { environment: String, count: usize },
    InitializedChanged { value: bool },
    AnalyticsReported { description: String },
    VariableUpdated { name: String },
    Other(&'static str),
}

/// Bus sink recording every event it observes.
#[derive(Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn attach(bus: &EventBus) -> Arc<Self> {
        let sink = Arc::new(Self::default());
        bus.attach(Arc::downgrade(&sink));
        sink
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }

    pub fn snapshot(&self) -> Vec<Recorded> {
        self.seen.lock().clone()
    }

    pub fn selected_changes(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|event| match event {
                Recorded::SelectedEnvironmentChanged { value } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn list_changes(&self) -> Vec<(String, usize)> {
        self.seen
            .lock()
            .iter()
            .filter_map(|event| match event {
                Recorded::VariablesListChanged { environment, count } => {
                    Some((environment.clone(), *count))
                }
                _ => None,
            })
            .collect()
    }

    pub fn initialized_count(&self) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|event| matches!(event, Recorded::InitializedChanged { value: true }))
            .count()
    }

    pub fn query_count(&self) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|event| matches!(event, Recorded::EnvironmentCurrent))
            .count()
    }

    pub fn analytics(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .filter_map(|event| match event {
                Recorded::AnalyticsReported { description } => Some(description.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording-sink"
    }

    fn on_event(&self, event: &mut BusEvent) {
        let recorded = match event {
            BusEvent::EnvironmentCurrent { .. } => Recorded::EnvironmentCurrent,
            BusEvent::SelectedEnvironmentChanged { value, .. } => {
                Recorded::SelectedEnvironmentChanged {
                    value: value.clone(),
                }
            }
            BusEvent::VariablesListChanged {
                environment, value, ..
            } => Recorded::VariablesListChanged {
                environment: environment.clone(),
                count: value.len(),
            },
            BusEvent::InitializedChanged { value, .. } => {
                Recorded::InitializedChanged { value: *value }
            }
            BusEvent::AnalyticsReported { report } => Recorded::AnalyticsReported {
                description: report.description.clone(),
            },
            BusEvent::VariableUpdated { value, .. } => Recorded::VariableUpdated {
                name: value.name.clone(),
            },
            other => Recorded::Other(other.name()),
        };
        self.seen.lock().push(recorded);
    }
}

/// A store whose every call fails, for the recovery paths.
pub struct FailingStore;

#[async_trait]
impl VariablesStore for FailingStore {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        Err(Error::storage_read("listing environments", "store offline"))
    }

    async fn list_variables(&self, _environment: &str) -> Result<Vec<Variable>> {
        Err(Error::storage_read("listing variables", "store offline"))
    }

    async fn update_variable(&self, variable: Variable) -> Result<Variable> {
        Err(Error::storage_write(variable.name, "store offline"))
    }
}

/// A memory store whose variable listings can be held back per environment,
/// for exercising the stale-response guard.
pub struct BlockingStore {
    inner: MemoryStore,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl BlockingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.inner
    }

    /// Hold back the next `list_variables` call for `environment` until the
    /// returned sender fires.
    pub fn hold(&self, environment: &str) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().insert(environment.to_string(), receiver);
        sender
    }
}

#[async_trait]
impl VariablesStore for BlockingStore {
    async fn list_environments(&self) -> Result<Vec<Environment>> {
        self.inner.list_environments().await
    }

    async fn list_variables(&self, environment: &str) -> Result<Vec<Variable>> {
        let gate = self.gates.lock().remove(environment);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.list_variables(environment).await
    }

    async fn update_variable(&self, variable: Variable) -> Result<Variable> {
        self.inner.update_variable(variable).await
    }
}
