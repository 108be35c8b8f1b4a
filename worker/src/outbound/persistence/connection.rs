//! Single PostgreSQL connection with bounded retry.

use std::fmt;

use diesel_async::{AsyncConnection, AsyncPgConnection};
use tracing::info;
use url::Url;

use crate::domain::{RetryPolicy, RetrySleeper, retry_with_policy};

/// Errors raised while connecting to PostgreSQL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreConnectError {
    /// Settings do not form a usable connection URL.
    #[error("invalid database connection settings: {message}")]
    InvalidUrl { message: String },

    /// Every connection attempt failed.
    #[error("could not connect to PostgreSQL after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

impl StoreConnectError {
    /// Create an invalid-URL error with the given message.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }
}

/// Where and as whom to connect to PostgreSQL.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database host name.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl StoreConfig {
    /// Connection URL with credentials and database name percent-encoded.
    ///
    /// # Examples
    /// ```
    /// use kwekker_worker::outbound::persistence::StoreConfig;
    ///
    /// let config = StoreConfig {
    ///     host: "db".to_owned(),
    ///     port: 5432,
    ///     user: "kwekker".to_owned(),
    ///     password: "p@ss".to_owned(),
    ///     database: "kwekker".to_owned(),
    /// };
    /// let url = config.database_url().expect("valid settings");
    /// assert_eq!(url.as_str(), "postgres://kwekker:p%40ss@db:5432/kwekker");
    /// ```
    pub fn database_url(&self) -> Result<Url, StoreConnectError> {
        let mut url = Url::parse(&format!("postgres://{}:{}/", self.host, self.port))
            .map_err(|err| StoreConnectError::invalid_url(err.to_string()))?;
        url.set_username(&self.user)
            .map_err(|()| StoreConnectError::invalid_url("user cannot be set"))?;
        url.set_password(Some(&self.password))
            .map_err(|()| StoreConnectError::invalid_url("password cannot be set"))?;
        url.path_segments_mut()
            .map_err(|()| StoreConnectError::invalid_url("database cannot be set"))?
            .pop_if_empty()
            .push(&self.database);
        Ok(url)
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Connect to PostgreSQL, retrying according to `policy`.
pub async fn connect_store(
    config: &StoreConfig,
    policy: &RetryPolicy,
    sleeper: &dyn RetrySleeper,
) -> Result<AsyncPgConnection, StoreConnectError> {
    let url = config.database_url()?;
    let connection = retry_with_policy(policy, sleeper, "postgres", || {
        AsyncPgConnection::establish(url.as_str())
    })
    .await
    .map_err(|exhausted| StoreConnectError::Exhausted {
        attempts: exhausted.attempts,
        message: exhausted.last_error.to_string(),
    })?;

    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "connected to PostgreSQL"
    );
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn config() -> StoreConfig {
        StoreConfig {
            host: "localhost".to_owned(),
            port: 5432,
            user: "worker".to_owned(),
            password: "s3cret/:@".to_owned(),
            database: "kwekker db".to_owned(),
        }
    }

    #[rstest]
    fn url_escapes_credentials_and_database(config: StoreConfig) {
        let url = config.database_url().expect("valid settings");

        assert_eq!(url.scheme(), "postgres");
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(5432));
        assert_eq!(url.username(), "worker");
        assert_eq!(url.password(), Some("s3cret%2F%3A%40"));
        assert_eq!(url.path(), "/kwekker%20db");
    }

    #[rstest]
    fn invalid_host_is_reported(mut config: StoreConfig) {
        config.host = "bad host".to_owned();

        let err = config.database_url().expect_err("host with space");
        assert!(matches!(err, StoreConnectError::InvalidUrl { .. }));
    }

    #[rstest]
    fn debug_redacts_password(config: StoreConfig) {
        let rendered = format!("{config:?}");

        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
