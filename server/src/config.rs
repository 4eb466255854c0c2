//! Configuration management for the relay gateway.
//!
//! Loads configuration from environment variables with sensible defaults. A
//! variable that is present but unparsable is a startup error, not a silent
//! fallback.

use relay_core::{PollPolicy, PropagationFormat};
use relay_kafka::DeliveryMode;
use relay_redis::PoolConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration errors reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set to a value that does not parse.
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// The offending environment variable.
        key: &'static str,
        /// The raw value it held.
        value: String,
    },
    /// The configured values contradict each other.
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Kafka producer configuration.
    pub kafka: KafkaConfig,
    /// Redis rendezvous store configuration.
    pub redis: RedisConfig,
    /// Poll loop configuration.
    pub poll: PollPolicy,
    /// Trace propagation format used on both the HTTP edge and the envelope.
    pub trace: PropagationFormat,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to, e.g. `0.0.0.0:8080`.
    pub bind_addr: String,
}

/// Kafka producer configuration.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Broker addresses (comma-separated).
    pub brokers: String,
    /// Topic request envelopes are published to.
    pub topic: String,
    /// Bound on the wait for a broker acknowledgement.
    pub publish_timeout: Duration,
    /// Whether publishes wait for the acknowledgement inline.
    pub delivery_mode: DeliveryMode,
}

/// Redis rendezvous store configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Connection pool bounds.
    pub pool: PoolConfig,
    /// Bound on a single `GET` round-trip.
    pub get_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for unparsable values,
    /// [`ConfigError::Inconsistent`] when the values cannot work together.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            server: ServerConfig {
                bind_addr: string_var("RELAY_BIND_ADDR", "0.0.0.0:8080"),
            },
            kafka: KafkaConfig {
                brokers: string_var("KAFKA_BROKERS", "localhost:9092"),
                topic: string_var("KAFKA_TOPIC", "relay-requests"),
                publish_timeout: Duration::from_millis(parsed_var(
                    "KAFKA_PUBLISH_TIMEOUT_MS",
                    5000,
                )?),
                delivery_mode: parsed_var("KAFKA_DELIVERY_MODE", DeliveryMode::AwaitAck)?,
            },
            redis: RedisConfig {
                url: string_var("REDIS_URL", "redis://localhost:6379"),
                pool: PoolConfig {
                    max_size: parsed_var("REDIS_POOL_MAX_SIZE", 10)?,
                    min_idle: parsed_var("REDIS_POOL_MIN_IDLE", 2)?,
                    acquire_timeout: Duration::from_millis(parsed_var(
                        "REDIS_ACQUIRE_TIMEOUT_MS",
                        5000,
                    )?),
                },
                get_timeout: Duration::from_millis(parsed_var("REDIS_GET_TIMEOUT_MS", 500)?),
            },
            poll: PollPolicy::new(
                Duration::from_millis(parsed_var("POLL_INTERVAL_MS", 100)?),
                parsed_var("POLL_MAX_ATTEMPTS", 30)?,
            ),
            trace: parsed_var("TRACE_PROPAGATION", PropagationFormat::W3c)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Inconsistent(
                "POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.redis.get_timeout > self.poll.budget() {
            return Err(ConfigError::Inconsistent(format!(
                "REDIS_GET_TIMEOUT_MS ({}ms) exceeds the poll budget ({}ms)",
                self.redis.get_timeout.as_millis(),
                self.poll.budget().as_millis()
            )));
        }
        Ok(())
    }
}

fn string_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                bind_addr: "0.0.0.0:8080".to_string(),
            },
            kafka: KafkaConfig {
                brokers: "localhost:9092".to_string(),
                topic: "relay-requests".to_string(),
                publish_timeout: Duration::from_secs(5),
                delivery_mode: DeliveryMode::AwaitAck,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                pool: PoolConfig::default(),
                get_timeout: Duration::from_millis(500),
            },
            poll: PollPolicy::new(Duration::from_millis(100), 30),
            trace: PropagationFormat::W3c,
        }
    }

    #[test]
    fn consistent_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn get_timeout_must_fit_in_the_poll_budget() {
        let mut config = base_config();
        config.redis.get_timeout = Duration::from_secs(60);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = base_config();
        config.poll = PollPolicy::new(Duration::from_millis(100), 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));
    }
}
