//! Core domain types, errors, and constants for the `varspace` workspace.
//!
//! This crate establishes the foundational data structures and error handling
//! mechanisms used by every other member. It performs no I/O of its own.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing all possible failure modes for predictable error handling.
//! - **`types`**: Contains the domain records (`Variable`, `Environment`) and
//!   newtype wrappers like `SystemVariables` that enforce invariants at the
//!   type level.
//! - **`events`**: The in-process event bus and the full catalogue of
//!   notifications and queries managers exchange.
//! - **`constants`**: Shared, static constants such as the default environment
//!   name and the universal variable scope.

pub mod constants;
pub mod errors;
pub mod events;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    events::{
        AnalyticsKind, AnalyticsReport, BusEvent, CurrentEnvironment, EventBus, EventSink,
        InstanceId, MutationPhase, SinkId,
    },
    types::{DatastoreScope, Environment, SystemVariables, Variable},
};
