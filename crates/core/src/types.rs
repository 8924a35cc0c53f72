use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use crate::constants::{
    ALL_DATASTORES, DEFAULT_ENVIRONMENT, ENVIRONMENTS_DATASTORE, UNIVERSAL_SCOPE,
    VARIABLES_DATASTORE,
};

/// A named value bound to an environment, or to every environment via the
/// universal `"*"` scope.
///
/// Persisted records carry an `id` and a revision marker; in-memory overrides
/// and system-variable entries never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Storage identifier, absent until the record is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Storage revision marker, absent until the record is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Variable name, unique within an environment's effective list.
    pub name: String,
    pub value: String,
    /// Name of the owning environment, or `"*"` for universal scope.
    pub environment: String,
    pub enabled: bool,
    /// Set on entries generated from the system-variable map.
    #[serde(rename = "isSystem", default)]
    pub system: bool,
}

impl Variable {
    /// Create an enabled, non-system variable scoped to `environment`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            rev: None,
            name: name.into(),
            value: value.into(),
            environment: environment.into(),
            enabled: true,
            system: false,
        }
    }

    /// Create an enabled variable at universal scope, the shape used by
    /// in-memory overrides.
    #[must_use]
    pub fn universal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, UNIVERSAL_SCOPE)
    }

    /// Whether the variable applies regardless of the selected environment.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        self.environment == UNIVERSAL_SCOPE
    }
}

/// A named scope partitioning variables.
///
/// The implicit `"default"` environment is never persisted, so a manager's
/// cached environment record is absent while `default` is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Environment name, unique among environments.
    pub name: String,
    /// Creation timestamp in milliseconds, when the store records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

impl Environment {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            rev: None,
            name: name.into(),
            created: None,
        }
    }

    /// Whether this is the implicit default environment.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ENVIRONMENT
    }
}

/// Externally supplied name→value mapping of system variables.
///
/// Insertion order is preserved so the entries generated from the map are
/// deterministic for a given input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemVariables(IndexMap<String, String>);

impl SystemVariables {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Create from an existing map
    #[must_use]
    pub fn from_map(map: IndexMap<String, String>) -> Self {
        Self(map)
    }

    /// Build from a loosely-typed JSON value. Anything other than an object
    /// with string values degrades to the empty map rather than raising.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::new();
        };
        let map = object
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_str()
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();
        Self(map)
    }

    /// Insert a variable, returning the previous value if any
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&String> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl Deref for SystemVariables {
    type Target = IndexMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SystemVariables {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<(String, String)> for SystemVariables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The datastore scope carried by a destruction notice: either a single
/// datastore name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatastoreScope {
    One(String),
    Many(Vec<String>),
}

impl DatastoreScope {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(name) => name.is_empty(),
            Self::Many(names) => names.is_empty(),
        }
    }

    /// Whether the scope reaches the variable caches: it names the variables
    /// or environments datastore, or is the `"all"` wildcard (a bare string,
    /// or the sole element of a list).
    #[must_use]
    pub fn targets_variables(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let names: &[String] = match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names.as_slice(),
        };
        names.iter().any(|name| name == VARIABLES_DATASTORE)
            || names.iter().any(|name| name == ENVIRONMENTS_DATASTORE)
            || (names.len() == 1 && names[0] == ALL_DATASTORES)
    }
}

impl From<&str> for DatastoreScope {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl From<Vec<String>> for DatastoreScope {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}
