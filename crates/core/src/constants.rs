/// Constants used throughout the varspace codebase
// Environment names
pub const DEFAULT_ENVIRONMENT: &str = "default";

// Scope applied to variables that are visible in every environment
// (in-memory overrides and system variables).
pub const UNIVERSAL_SCOPE: &str = "*";

// Datastore names carried by destruction notices that require the
// variable caches to be invalidated.
pub const VARIABLES_DATASTORE: &str = "variables";
pub const ENVIRONMENTS_DATASTORE: &str = "variables-environments";
pub const ALL_DATASTORES: &str = "all";
