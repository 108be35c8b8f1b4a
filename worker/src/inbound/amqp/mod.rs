//! RabbitMQ adapter built on `lapin`.
//!
//! - [`connection`]: broker connection with bounded retry.
//! - [`topology`]: exchange, queue, and binding declaration.
//! - [`subscription`]: manual-ack consumers exposed as [`DeliveryStream`]s.
//! - [`wire`]: protobuf message schema and the [`ProtobufDecoder`].
//! - [`publish`]: persistent publishing for the manual publisher.
//!
//! [`DeliveryStream`]: crate::domain::ports::DeliveryStream

pub mod connection;
pub mod publish;
pub mod subscription;
pub mod topology;
pub mod wire;

use thiserror::Error;

pub use connection::{BrokerConfig, BrokerConnection};
pub use publish::{enable_confirms, publish_command};
pub use subscription::{limit_prefetch, subscribe};
pub use topology::declare_topology;
pub use wire::{ProtobufDecoder, encode_command};

/// Errors raised by the RabbitMQ adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Every connection attempt failed.
    #[error("could not connect to RabbitMQ after {attempts} attempts: {message}")]
    ConnectExhausted { attempts: u32, message: String },
    /// Opening a channel failed.
    #[error("failed to open RabbitMQ channel: {message}")]
    Channel { message: String },
    /// Declaring an exchange, queue, or binding failed.
    #[error("failed to declare {entity}: {message}")]
    Declare { entity: String, message: String },
    /// Setting the consumer prefetch limit failed.
    #[error("failed to limit prefetch to {prefetch_count}: {message}")]
    Qos { prefetch_count: u16, message: String },
    /// Starting a consumer failed.
    #[error("failed to consume from queue {queue}: {message}")]
    Consume { queue: String, message: String },
    /// Publishing or its confirmation failed.
    #[error("failed to publish to {exchange}/{routing_key}: {message}")]
    Publish {
        exchange: String,
        routing_key: String,
        message: String,
    },
}
