//! Kwekker ingestion worker.
//!
//! Consumes kwek and user change commands from RabbitMQ, validates them, and
//! applies them serially to PostgreSQL. The crate follows a hexagonal layout:
//!
//! - [`domain`] holds the command model, validation rules, routing table,
//!   ports, and the ingestion pipeline (queue consumers and dispatcher).
//! - [`inbound`] adapts the AMQP broker and the protobuf wire schema.
//! - [`outbound`] adapts the PostgreSQL store.
//! - [`settings`] loads and validates configuration; [`app`] wires a run.

pub mod app;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod settings;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use app::{WorkerConfig, WorkerError, run_worker};
