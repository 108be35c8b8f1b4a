//! Persistent publishing of encoded commands.

use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel};
use tracing::info;

use super::BrokerError;
use super::wire::encode_command;
use crate::domain::{Command, QueueBinding, binding_for_kind};

/// Content type stamped on every published body.
pub const CONTENT_TYPE: &str = "application/protobuf";
/// AMQP delivery mode for messages that survive a broker restart.
pub const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// Put `channel` into confirm mode so publishes wait for the broker.
pub async fn enable_confirms(channel: &Channel) -> Result<(), BrokerError> {
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|err| BrokerError::Channel {
            message: format!("confirm mode refused: {err}"),
        })
}

/// Publish `command` to the exchange its routing-table entry names.
///
/// The channel must be in confirm mode (see [`enable_confirms`]); a publish
/// the broker does not positively confirm is an error.
pub async fn publish_command(channel: &Channel, command: &Command) -> Result<(), BrokerError> {
    let kind = command.kind();
    let binding: &QueueBinding = binding_for_kind(kind).ok_or_else(|| BrokerError::Publish {
        exchange: String::new(),
        routing_key: String::new(),
        message: format!("no queue carries {kind}"),
    })?;
    let publish_error = |err: lapin::Error| BrokerError::Publish {
        exchange: binding.exchange.to_owned(),
        routing_key: binding.routing_key().to_owned(),
        message: err.to_string(),
    };

    let payload = encode_command(command);
    let properties = BasicProperties::default()
        .with_content_type(CONTENT_TYPE.to_owned().into())
        .with_delivery_mode(PERSISTENT_DELIVERY_MODE);
    let confirmation = channel
        .basic_publish(
            binding.exchange,
            binding.routing_key(),
            BasicPublishOptions::default(),
            &payload,
            properties,
        )
        .await
        .map_err(publish_error)?
        .await
        .map_err(publish_error)?;
    if let Some(problem) = unconfirmed(&confirmation) {
        return Err(BrokerError::Publish {
            exchange: binding.exchange.to_owned(),
            routing_key: binding.routing_key().to_owned(),
            message: problem.to_owned(),
        });
    }

    info!(
        kind = %kind,
        exchange = binding.exchange,
        routing_key = binding.routing_key(),
        bytes = payload.len(),
        "command published"
    );
    Ok(())
}

fn unconfirmed(confirmation: &Confirmation) -> Option<&'static str> {
    match confirmation {
        Confirmation::Ack(None) => None,
        Confirmation::Ack(Some(_)) => Some("message was returned as unroutable"),
        Confirmation::Nack(_) => Some("broker rejected the message"),
        Confirmation::NotRequested => Some("channel is not in confirm mode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Confirmation::Ack(None), None)]
    #[case(Confirmation::Nack(None), Some("broker rejected the message"))]
    #[case(Confirmation::NotRequested, Some("channel is not in confirm mode"))]
    fn only_positive_confirms_count_as_published(
        #[case] confirmation: Confirmation,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(unconfirmed(&confirmation), expected);
    }
}
