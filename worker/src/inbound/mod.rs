//! Inbound adapters that turn broker traffic into domain commands while
//! keeping transport details at the edge.
//!
//! The RabbitMQ adapter lives under [`amqp`].

pub mod amqp;
