//! Declares exchanges, queues, and bindings before consumers start.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use tracing::{debug, info};

use super::BrokerError;
use crate::domain::TopologyPlan;

/// Declare every exchange and queue in `plan` and bind each queue to its
/// exchange with the queue name as routing key.
///
/// Exchanges are durable topic exchanges; queues are durable, shared, and
/// never auto-deleted. Redeclaring identical entities is a no-op on the
/// broker, so this is safe to run on every start.
pub async fn declare_topology(channel: &Channel, plan: &TopologyPlan) -> Result<(), BrokerError> {
    for exchange in plan.exchanges() {
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| declare_error(format!("exchange {exchange}"), &err))?;
        debug!(exchange, "exchange declared");
    }

    for binding in plan.queues() {
        channel
            .queue_declare(
                binding.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| declare_error(format!("queue {}", binding.queue), &err))?;

        channel
            .queue_bind(
                binding.queue,
                binding.exchange,
                binding.routing_key(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|err| {
                declare_error(
                    format!("binding {} -> {}", binding.exchange, binding.queue),
                    &err,
                )
            })?;
        debug!(queue = binding.queue, exchange = binding.exchange, "queue bound");
    }

    info!(
        exchanges = plan.exchanges().len(),
        queues = plan.queues().len(),
        "topology declared"
    );
    Ok(())
}

fn declare_error(entity: String, err: &lapin::Error) -> BrokerError {
    BrokerError::Declare {
        entity,
        message: err.to_string(),
    }
}
