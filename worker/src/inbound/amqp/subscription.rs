//! Manual-acknowledgement consumers exposed as domain delivery streams.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::Channel;
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use tracing::info;

use super::BrokerError;
use crate::domain::QueueBinding;
use crate::domain::ports::{
    AckError, DeliveryAcker, DeliveryStream, DeliveryStreamError, InboundDelivery,
};

/// Consumer tag used for `binding`'s subscription.
pub fn consumer_tag(binding: &QueueBinding) -> String {
    format!("kwekker-worker.{}", binding.queue)
}

/// Cap the unacknowledged deliveries the broker pushes to each consumer
/// later started on `channel`.
///
/// Deliveries stay unacknowledged until their command is applied, so without
/// a limit the broker would stream the whole backlog into memory.
pub async fn limit_prefetch(channel: &Channel, prefetch_count: u16) -> Result<(), BrokerError> {
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .map_err(|err| BrokerError::Qos {
            prefetch_count,
            message: err.to_string(),
        })?;
    info!(prefetch_count, "consumer prefetch limited");
    Ok(())
}

/// Start consuming `binding`'s queue with manual acknowledgement.
pub async fn subscribe(
    channel: &Channel,
    binding: &QueueBinding,
) -> Result<DeliveryStream, BrokerError> {
    let consumer = channel
        .basic_consume(
            binding.queue,
            &consumer_tag(binding),
            BasicConsumeOptions {
                no_ack: false,
                ..BasicConsumeOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|err| BrokerError::Consume {
            queue: binding.queue.to_owned(),
            message: err.to_string(),
        })?;
    info!(queue = binding.queue, "subscribed");

    Ok(consumer
        .map(|item| {
            item.map(into_inbound)
                .map_err(|err| DeliveryStreamError::broker(err.to_string()))
        })
        .boxed())
}

fn into_inbound(delivery: Delivery) -> InboundDelivery {
    InboundDelivery::new(
        delivery.delivery_tag,
        delivery.data,
        Box::new(LapinAcker {
            acker: delivery.acker,
        }),
    )
}

struct LapinAcker {
    acker: Acker,
}

#[async_trait]
impl DeliveryAcker for LapinAcker {
    async fn ack(&self) -> Result<(), AckError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|err| AckError::broker(err.to_string()))
    }

    async fn reject(&self, requeue: bool) -> Result<(), AckError> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map(|_| ())
            .map_err(|err| AckError::broker(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ROUTING_TABLE;
    use rstest::rstest;

    #[rstest]
    fn consumer_tags_are_unique_per_queue() {
        let mut tags = ROUTING_TABLE.iter().map(consumer_tag).collect::<Vec<_>>();
        tags.sort();
        tags.dedup();

        assert_eq!(tags.len(), ROUTING_TABLE.len());
        assert!(tags.contains(&"kwekker-worker.kwek.create".to_owned()));
    }

    #[rstest]
    fn prefetch_failures_name_the_limit() {
        let err = BrokerError::Qos {
            prefetch_count: 32,
            message: "channel closed".to_owned(),
        };

        assert_eq!(
            err.to_string(),
            "failed to limit prefetch to 32: channel closed"
        );
    }
}
