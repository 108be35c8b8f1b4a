//! Publish a single command to the broker for manual testing.
//!
//! The command is stamped with the current time, encoded with the worker's
//! wire schema, and published persistently to the exchange and routing key
//! the worker consumes it from. Broker settings come from the same
//! `RABBITMQ_*` variables the worker reads.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use lapin::Channel;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use kwekker_worker::domain::{
    Command, CreateKwek, CreateUser, DeleteKwek, DeleteUser, ROUTING_TABLE, RetryPolicy,
    TokioSleeper, TopologyPlan, UpdateKwek, UpdateUser,
};
use kwekker_worker::inbound::amqp::{
    BrokerConnection, BrokerError, declare_topology, enable_confirms, publish_command,
};
use kwekker_worker::settings::load_broker_config;

/// `publish-command` arguments.
#[derive(Debug, Parser)]
#[command(
    name = "publish-command",
    about = "Publish one kwek or user command to RabbitMQ",
    version
)]
struct CliArgs {
    #[command(subcommand)]
    command: CommandArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum CommandArgs {
    /// Create a kwek owned by an existing user.
    CreateKwek {
        #[arg(long)]
        kwek_guid: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        text: String,
    },
    /// Replace a kwek's text.
    UpdateKwek {
        #[arg(long)]
        kwek_guid: String,
        #[arg(long)]
        text: String,
    },
    /// Delete a kwek.
    DeleteKwek {
        #[arg(long)]
        kwek_guid: String,
    },
    /// Register a user.
    CreateUser {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        avatar_url: String,
    },
    /// Change some of a user's profile fields.
    UpdateUser {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Delete a user.
    DeleteUser {
        #[arg(long)]
        user_id: String,
    },
}

impl CommandArgs {
    fn into_command(self, now: DateTime<Utc>) -> Command {
        match self {
            Self::CreateKwek {
                kwek_guid,
                user_id,
                text,
            } => Command::CreateKwek(CreateKwek {
                kwek_guid,
                user_id,
                text,
                posted_at: Some(now),
            }),
            Self::UpdateKwek { kwek_guid, text } => Command::UpdateKwek(UpdateKwek {
                kwek_guid,
                text,
                updated_at: Some(now),
            }),
            Self::DeleteKwek { kwek_guid } => Command::DeleteKwek(DeleteKwek { kwek_guid }),
            Self::CreateUser {
                user_id,
                username,
                email,
                display_name,
                avatar_url,
            } => Command::CreateUser(CreateUser {
                user_id,
                username,
                email,
                display_name,
                avatar_url,
                created_at: Some(now),
            }),
            Self::UpdateUser {
                user_id,
                username,
                email,
                display_name,
                avatar_url,
            } => Command::UpdateUser(UpdateUser {
                user_id,
                username,
                email,
                display_name,
                avatar_url,
                updated_at: Some(now),
            }),
            Self::DeleteUser { user_id } => Command::DeleteUser(DeleteUser { user_id }),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build publisher runtime")?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: CliArgs) -> Result<()> {
    let config = load_broker_config("publish-command").wrap_err("failed to load broker settings")?;
    let command = args.command.into_command(Utc::now());

    let connection = BrokerConnection::connect(&config, &RetryPolicy::default(), &TokioSleeper)
        .await
        .wrap_err("failed to connect to RabbitMQ")?;
    let channel = match connection.open_channel().await {
        Ok(channel) => channel,
        Err(err) => {
            connection.close(None).await;
            return Err(err).wrap_err("failed to open channel");
        }
    };

    let result = declare_and_publish(&channel, &command).await;
    connection.close(Some(channel)).await;
    result.wrap_err_with(|| format!("failed to publish {}", command.kind()))
}

async fn declare_and_publish(channel: &Channel, command: &Command) -> Result<(), BrokerError> {
    declare_topology(channel, &TopologyPlan::from_bindings(&ROUTING_TABLE)).await?;
    enable_confirms(channel).await?;
    publish_command(channel, command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn parse(args: &[&str]) -> CommandArgs {
        CliArgs::try_parse_from(std::iter::once("publish-command").chain(args.iter().copied()))
            .expect("arguments parse")
            .command
    }

    #[rstest]
    fn create_kwek_is_stamped_with_now() {
        let now = Utc
            .with_ymd_and_hms(2026, 5, 4, 3, 2, 1)
            .single()
            .expect("valid time");
        let command = parse(&[
            "create-kwek",
            "--kwek-guid",
            "f9d30d37-63a8-44a9-b2c3-3a45eb0701bc",
            "--user-id",
            "provider|7",
            "--text",
            "Hello world!",
        ])
        .into_command(now);

        assert_eq!(
            command,
            Command::CreateKwek(CreateKwek {
                kwek_guid: "f9d30d37-63a8-44a9-b2c3-3a45eb0701bc".to_owned(),
                user_id: "provider|7".to_owned(),
                text: "Hello world!".to_owned(),
                posted_at: Some(now),
            })
        );
    }

    #[rstest]
    fn update_user_fields_are_optional() {
        let args = parse(&["update-user", "--user-id", "provider|7", "--email", "a@b.c"]);

        assert_eq!(
            args,
            CommandArgs::UpdateUser {
                user_id: "provider|7".to_owned(),
                username: None,
                email: Some("a@b.c".to_owned()),
                display_name: None,
                avatar_url: None,
            }
        );
    }

    #[rstest]
    #[case(&["delete-kwek"])]
    #[case(&["create-user", "--user-id", "u"])]
    #[case(&["rename-user", "--user-id", "u"])]
    fn incomplete_or_unknown_commands_are_rejected(#[case] args: &[&str]) {
        let argv = std::iter::once("publish-command").chain(args.iter().copied());
        assert!(CliArgs::try_parse_from(argv).is_err());
    }
}
