//! Broker connection with bounded retry.

use std::fmt;

use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::{info, warn};

use super::BrokerError;
use crate::domain::{RetryPolicy, RetrySleeper, retry_with_policy};

const CLOSE_REPLY_CODE: u16 = 200;
const CLOSE_REPLY_TEXT: &str = "kwekker-worker shutting down";

/// Where and as whom to connect to RabbitMQ.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker host name.
    pub host: String,
    /// AMQP port.
    pub port: u16,
    /// Virtual host.
    pub vhost: String,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl BrokerConfig {
    /// Connection URI built from the individual fields, so credentials never
    /// need escaping.
    pub fn uri(&self) -> AMQPUri {
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            query: AMQPQueryString::default(),
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An open broker connection.
pub struct BrokerConnection {
    connection: Connection,
}

impl BrokerConnection {
    /// Connect, retrying according to `policy`.
    pub async fn connect(
        config: &BrokerConfig,
        policy: &RetryPolicy,
        sleeper: &dyn RetrySleeper,
    ) -> Result<Self, BrokerError> {
        let uri = config.uri();
        let connection = retry_with_policy(policy, sleeper, "rabbitmq", || {
            Connection::connect_uri(uri.clone(), ConnectionProperties::default())
        })
        .await
        .map_err(|exhausted| BrokerError::ConnectExhausted {
            attempts: exhausted.attempts,
            message: exhausted.last_error.to_string(),
        })?;

        info!(
            host = %config.host,
            port = config.port,
            vhost = %config.vhost,
            "connected to RabbitMQ"
        );
        Ok(Self { connection })
    }

    /// Open a channel on this connection.
    pub async fn open_channel(&self) -> Result<Channel, BrokerError> {
        self.connection
            .create_channel()
            .await
            .map_err(|err| BrokerError::Channel {
                message: err.to_string(),
            })
    }

    /// Close `channel` and then the connection. Failures are logged.
    pub async fn close(self, channel: Option<Channel>) {
        if let Some(channel) = channel {
            if let Err(err) = channel.close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT).await {
                warn!(error = %err, "failed to close RabbitMQ channel");
            }
        }
        match self
            .connection
            .close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT)
            .await
        {
            Ok(()) => info!("RabbitMQ connection closed"),
            Err(err) => warn!(error = %err, "failed to close RabbitMQ connection"),
        }
    }
}
