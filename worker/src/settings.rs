//! Worker configuration loaded via OrthoConfig.
//!
//! Each section reads its own environment prefix: `RABBITMQ_*` for the
//! broker, `POSTGRES_*` for the store, and `WORKER_*` for pipeline tuning.
//! [`load_worker_config`] validates all three into a [`WorkerConfig`] before
//! anything connects.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::app::WorkerConfig;
use crate::domain::RetryPolicy;
use crate::inbound::amqp::BrokerConfig;
use crate::outbound::persistence::StoreConfig;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_VHOST: &str = "/";

/// Errors raised while loading or validating settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    /// A section could not be read from its sources.
    #[error("failed to load {section} settings: {message}")]
    Load {
        section: &'static str,
        message: String,
    },
    /// A required value is absent or empty.
    #[error("missing required setting {key}")]
    Missing { key: &'static str },
    /// A value is present but unusable.
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// RabbitMQ connection settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RABBITMQ")]
pub struct BrokerSettings {
    /// Broker host name.
    pub host: Option<String>,
    /// AMQP port.
    #[ortho_config(default = 5672)]
    pub port: u16,
    /// Virtual host.
    pub vhost: Option<String>,
    /// Login user.
    pub user: Option<String>,
    /// Login password.
    pub pass: Option<String>,
}

impl BrokerSettings {
    /// Return the configured host, falling back to the default.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Return the configured virtual host, falling back to the default.
    pub fn vhost(&self) -> &str {
        self.vhost.as_deref().unwrap_or(DEFAULT_VHOST)
    }

    /// Validate into a connection config.
    pub fn to_config(&self) -> Result<BrokerConfig, SettingsError> {
        Ok(BrokerConfig {
            host: self.host().to_owned(),
            port: self.port,
            vhost: self.vhost().to_owned(),
            username: required(self.user.as_deref(), "RABBITMQ_USER")?,
            password: required(self.pass.as_deref(), "RABBITMQ_PASS")?,
        })
    }
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "POSTGRES")]
pub struct StoreSettings {
    /// Database host name.
    pub host: Option<String>,
    /// Database port.
    #[ortho_config(default = 5432)]
    pub port: u16,
    /// Login user.
    pub user: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Database name.
    pub db: Option<String>,
}

impl StoreSettings {
    /// Return the configured host, falling back to the default.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Validate into a connection config.
    pub fn to_config(&self) -> Result<StoreConfig, SettingsError> {
        Ok(StoreConfig {
            host: self.host().to_owned(),
            port: self.port,
            user: required(self.user.as_deref(), "POSTGRES_USER")?,
            password: required(self.password.as_deref(), "POSTGRES_PASSWORD")?,
            database: required(self.db.as_deref(), "POSTGRES_DB")?,
        })
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "WORKER")]
pub struct PipelineSettings {
    /// Connection attempts per dependency, including the first.
    #[ortho_config(default = 5)]
    pub connect_attempts: u32,
    /// Delay after the first failed attempt, in seconds.
    #[ortho_config(default = 5)]
    pub connect_delay_secs: u64,
    /// Delay multiplier applied after each failed attempt.
    #[ortho_config(default = 1.0)]
    pub connect_backoff_factor: f64,
    /// Longest delay between attempts, in seconds.
    #[ortho_config(default = 60)]
    pub connect_max_delay_secs: u64,
    /// Commands buffered between consumers and the dispatcher.
    #[ortho_config(default = 32)]
    pub dispatch_capacity: usize,
    /// Unacknowledged deliveries the broker may push to each consumer.
    #[ortho_config(default = 32)]
    pub prefetch_count: u16,
}

impl PipelineSettings {
    /// Validate into a retry policy.
    pub fn retry_policy(&self) -> Result<RetryPolicy, SettingsError> {
        let max_attempts = self.connect_attempts;
        if max_attempts == 0 {
            return Err(invalid("WORKER_CONNECT_ATTEMPTS", "must be at least 1"));
        }
        let backoff_factor = self.connect_backoff_factor;
        if !backoff_factor.is_finite() || backoff_factor < 1.0 {
            return Err(invalid(
                "WORKER_CONNECT_BACKOFF_FACTOR",
                "must be a finite number of at least 1",
            ));
        }
        Ok(RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_secs(self.connect_delay_secs),
            backoff_factor,
            max_delay: Duration::from_secs(self.connect_max_delay_secs),
        })
    }

    /// Validate the dispatch channel capacity.
    pub fn dispatch_capacity(&self) -> Result<usize, SettingsError> {
        match self.dispatch_capacity {
            0 => Err(invalid("WORKER_DISPATCH_CAPACITY", "must be at least 1")),
            capacity => Ok(capacity),
        }
    }

    /// Validate the per-consumer prefetch limit.
    ///
    /// Zero would mean "unlimited" to the broker, so it is refused.
    pub fn prefetch_count(&self) -> Result<u16, SettingsError> {
        match self.prefetch_count {
            0 => Err(invalid("WORKER_PREFETCH_COUNT", "must be at least 1")),
            count => Ok(count),
        }
    }
}

fn required(value: Option<&str>, key: &'static str) -> Result<String, SettingsError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(SettingsError::Missing { key }),
    }
}

fn invalid(key: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.to_owned(),
    }
}

fn load_error(section: &'static str, message: impl ToString) -> SettingsError {
    SettingsError::Load {
        section,
        message: message.to_string(),
    }
}

/// Load every section from the environment and validate it.
///
/// Command-line arguments are not consulted; `program` only names the
/// process for OrthoConfig.
pub fn load_worker_config(program: &str) -> Result<WorkerConfig, SettingsError> {
    let args = || [OsString::from(program)];
    let broker = BrokerSettings::load_from_iter(args()).map_err(|err| load_error("broker", err))?;
    let store = StoreSettings::load_from_iter(args()).map_err(|err| load_error("store", err))?;
    let pipeline =
        PipelineSettings::load_from_iter(args()).map_err(|err| load_error("pipeline", err))?;

    Ok(WorkerConfig {
        broker: broker.to_config()?,
        store: store.to_config()?,
        retry: pipeline.retry_policy()?,
        dispatch_capacity: pipeline.dispatch_capacity()?,
        prefetch_count: pipeline.prefetch_count()?,
    })
}

/// Load only the broker section, for tools that publish without a store.
pub fn load_broker_config(program: &str) -> Result<BrokerConfig, SettingsError> {
    BrokerSettings::load_from_iter([OsString::from(program)])
        .map_err(|err| load_error("broker", err))?
        .to_config()
}

#[cfg(test)]
mod tests {
    //! Unit tests for settings parsing and validation.

    use super::*;

    use env_lock::lock_env;
    use rstest::rstest;

    const ALL_KEYS: [&str; 16] = [
        "RABBITMQ_HOST",
        "RABBITMQ_PORT",
        "RABBITMQ_VHOST",
        "RABBITMQ_USER",
        "RABBITMQ_PASS",
        "POSTGRES_HOST",
        "POSTGRES_PORT",
        "POSTGRES_USER",
        "POSTGRES_PASSWORD",
        "POSTGRES_DB",
        "WORKER_CONNECT_ATTEMPTS",
        "WORKER_CONNECT_DELAY_SECS",
        "WORKER_CONNECT_BACKOFF_FACTOR",
        "WORKER_CONNECT_MAX_DELAY_SECS",
        "WORKER_DISPATCH_CAPACITY",
        "WORKER_PREFETCH_COUNT",
    ];

    fn env_with(overrides: &[(&str, &str)]) -> Vec<(&'static str, Option<String>)> {
        ALL_KEYS
            .iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| (*value).to_owned());
                (*key, value)
            })
            .collect()
    }

    const CREDENTIALS: [(&str, &str); 5] = [
        ("RABBITMQ_USER", "guest"),
        ("RABBITMQ_PASS", "guest-pass"),
        ("POSTGRES_USER", "kwekker"),
        ("POSTGRES_PASSWORD", "db-pass"),
        ("POSTGRES_DB", "kwekker"),
    ];

    #[rstest]
    fn defaults_fill_optional_values() {
        let _guard = lock_env(env_with(&CREDENTIALS));

        let config = load_worker_config("kwekker-worker").expect("config should load");

        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.broker.vhost, "/");
        assert_eq!(config.broker.username, "guest");
        assert_eq!(config.store.host, "localhost");
        assert_eq!(config.store.port, 5432);
        assert_eq!(config.store.database, "kwekker");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.dispatch_capacity, 32);
        assert_eq!(config.prefetch_count, 32);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let mut vars = CREDENTIALS.to_vec();
        vars.extend([
            ("RABBITMQ_HOST", "rabbit"),
            ("RABBITMQ_PORT", "5673"),
            ("RABBITMQ_VHOST", "kwekker"),
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_PORT", "6543"),
            ("WORKER_CONNECT_ATTEMPTS", "3"),
            ("WORKER_CONNECT_DELAY_SECS", "1"),
            ("WORKER_CONNECT_BACKOFF_FACTOR", "2"),
            ("WORKER_CONNECT_MAX_DELAY_SECS", "10"),
            ("WORKER_DISPATCH_CAPACITY", "8"),
            ("WORKER_PREFETCH_COUNT", "4"),
        ]);
        let _guard = lock_env(env_with(&vars));

        let config = load_worker_config("kwekker-worker").expect("config should load");

        assert_eq!(config.broker.host, "rabbit");
        assert_eq!(config.broker.port, 5673);
        assert_eq!(config.broker.vhost, "kwekker");
        assert_eq!(config.store.host, "db");
        assert_eq!(config.store.port, 6543);
        assert_eq!(
            config.retry,
            RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                backoff_factor: 2.0,
                max_delay: Duration::from_secs(10),
            }
        );
        assert_eq!(config.dispatch_capacity, 8);
        assert_eq!(config.prefetch_count, 4);
    }

    #[rstest]
    #[case::broker_user("RABBITMQ_USER")]
    #[case::broker_pass("RABBITMQ_PASS")]
    #[case::store_user("POSTGRES_USER")]
    #[case::store_password("POSTGRES_PASSWORD")]
    #[case::store_db("POSTGRES_DB")]
    fn missing_credentials_are_reported(#[case] key: &'static str) {
        let vars = CREDENTIALS
            .iter()
            .copied()
            .filter(|(name, _)| *name != key)
            .collect::<Vec<_>>();
        let _guard = lock_env(env_with(&vars));

        let err = load_worker_config("kwekker-worker").expect_err("credential missing");

        assert_eq!(err, SettingsError::Missing { key });
    }

    #[rstest]
    fn empty_credentials_count_as_missing() {
        let settings = BrokerSettings {
            host: None,
            port: 5672,
            vhost: None,
            user: Some("guest".to_owned()),
            pass: Some(String::new()),
        };

        assert_eq!(
            settings.to_config(),
            Err(SettingsError::Missing {
                key: "RABBITMQ_PASS"
            })
        );
    }

    fn pipeline() -> PipelineSettings {
        PipelineSettings {
            connect_attempts: 5,
            connect_delay_secs: 5,
            connect_backoff_factor: 1.0,
            connect_max_delay_secs: 60,
            dispatch_capacity: 32,
            prefetch_count: 32,
        }
    }

    #[rstest]
    #[case::zero_attempts(
        PipelineSettings { connect_attempts: 0, ..pipeline() },
        "WORKER_CONNECT_ATTEMPTS"
    )]
    #[case::shrinking_backoff(
        PipelineSettings { connect_backoff_factor: 0.5, ..pipeline() },
        "WORKER_CONNECT_BACKOFF_FACTOR"
    )]
    #[case::zero_capacity(
        PipelineSettings { dispatch_capacity: 0, ..pipeline() },
        "WORKER_DISPATCH_CAPACITY"
    )]
    #[case::zero_prefetch(
        PipelineSettings { prefetch_count: 0, ..pipeline() },
        "WORKER_PREFETCH_COUNT"
    )]
    fn unusable_pipeline_values_are_rejected(
        #[case] settings: PipelineSettings,
        #[case] key: &str,
    ) {
        let err = settings
            .retry_policy()
            .and_then(|_| settings.dispatch_capacity())
            .and_then(|_| settings.prefetch_count())
            .expect_err("invalid pipeline settings");

        match err {
            SettingsError::Invalid { key: reported, .. } => assert_eq!(reported, key),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn pipeline_section_loads_without_worker_variables() {
        let _guard = lock_env(env_with(&[]));

        let settings = PipelineSettings::load_from_iter([OsString::from("kwekker-worker")])
            .expect("defaults should fill the section");

        assert_eq!(settings.retry_policy(), Ok(RetryPolicy::default()));
        assert_eq!(settings.dispatch_capacity(), Ok(32));
        assert_eq!(settings.prefetch_count(), Ok(32));
    }
}
