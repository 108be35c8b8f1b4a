//! Broker-neutral view of one received message and its settlement.

use std::fmt;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::define_port_error;

define_port_error! {
    /// Errors raised while acknowledging or rejecting a delivery.
    pub enum AckError {
        /// Broker refused or lost the settlement.
        Broker { message: String } => "delivery settlement failed: {message}",
    }
}

define_port_error! {
    /// Errors surfaced by a subscription stream.
    pub enum DeliveryStreamError {
        /// Subscription failed; the stream should be treated as finished.
        Broker { message: String } => "delivery stream failed: {message}",
    }
}

/// Final disposition of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Processing finished; remove the message.
    Ack,
    /// Processing failed; drop the message or return it to the queue.
    Reject {
        /// Return the message to the queue instead of discarding it.
        requeue: bool,
    },
}

/// Settles one delivery with the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    /// Positively acknowledge the delivery.
    async fn ack(&self) -> Result<(), AckError>;

    /// Negatively acknowledge the delivery.
    async fn reject(&self, requeue: bool) -> Result<(), AckError>;
}

/// A received message awaiting exactly one settlement.
pub struct InboundDelivery {
    delivery_tag: u64,
    body: Vec<u8>,
    acker: Box<dyn DeliveryAcker>,
}

impl InboundDelivery {
    /// Wrap a body and the handle that settles it.
    pub fn new(delivery_tag: u64, body: Vec<u8>, acker: Box<dyn DeliveryAcker>) -> Self {
        Self {
            delivery_tag,
            body,
            acker,
        }
    }

    /// Broker-assigned tag, unique per channel.
    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// Raw message body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Settle the delivery. Consumes it so a delivery cannot be settled twice.
    pub async fn settle(self, settlement: Settlement) -> Result<(), AckError> {
        match settlement {
            Settlement::Ack => self.acker.ack().await,
            Settlement::Reject { requeue } => self.acker.reject(requeue).await,
        }
    }
}

impl fmt::Debug for InboundDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundDelivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Stream of deliveries from one queue subscription.
pub type DeliveryStream = BoxStream<'static, Result<InboundDelivery, DeliveryStreamError>>;
