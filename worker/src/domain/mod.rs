//! Domain model and pipeline core.
//!
//! Purpose: hold the transport-free parts of the worker. Commands, the
//! routing table, validation rules, retry policy, and the ingest pipeline
//! live here and talk to the outside world only through [`ports`].
//!
//! Public surface:
//! - Command (alias to `command::Command`) and its six payload structs.
//! - ROUTING_TABLE / TopologyPlan: queues, exchanges, and bindings.
//! - validate / ValidationResult: pure business-rule checks.
//! - RetryPolicy / retry_with_policy: bounded connection retries.

mod command;
pub mod ingest;
pub mod ports;
pub mod retry;
mod routing;
pub mod validation;

pub use self::command::{
    Command, CommandKind, CreateKwek, CreateUser, DeleteKwek, DeleteUser, UpdateKwek, UpdateUser,
    UserChanges,
};
pub use self::retry::{RetryExhausted, RetryPolicy, RetrySleeper, TokioSleeper, retry_with_policy};
pub use self::routing::{
    KWEK_EXCHANGE, QueueBinding, ROUTING_TABLE, TopologyPlan, USER_EXCHANGE, binding_for_kind,
};
pub use self::validation::{Field, ValidationError, ValidationResult, validate};
