//! Event Stream Configuration Settings
//!
//! Configuration types for the event stream service, loaded from environment
//! variables.

use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Production deployment.
    Production,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Check if this is the production environment.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// gRPC server port.
    pub grpc_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_port: 50052,
            health_port: 8082,
        }
    }
}

/// Per-stream session settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Interval between keep-alive messages on an idle stream.
    pub heartbeat_interval: Duration,
    /// Buffered responses per stream before sends apply backpressure.
    pub outbound_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            outbound_capacity: 256,
        }
    }
}

/// In-memory bus settings.
#[derive(Debug, Clone, Copy)]
pub struct BusSettings {
    /// Broadcast buffer per topic.
    pub topic_capacity: usize,
    /// Envelope queue depth per subscription.
    pub subscription_capacity: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            topic_capacity: 1_024,
            subscription_capacity: 64,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Server port settings.
    pub server: ServerSettings,
    /// Session settings.
    pub session: SessionSettings,
    /// Bus settings.
    pub bus: BusSettings,
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a duration or capacity is set to zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a duration or capacity is set to zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let environment = env
            .get("APP_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let defaults = ServerSettings::default();
        let server = ServerSettings {
            grpc_port: env.parse_or("EVENT_STREAM_GRPC_PORT", defaults.grpc_port),
            health_port: env.parse_or("EVENT_STREAM_HEALTH_PORT", defaults.health_port),
        };

        let defaults = SessionSettings::default();
        let session = SessionSettings {
            heartbeat_interval: Duration::from_secs(env.nonzero(
                "EVENT_STREAM_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval.as_secs(),
            )?),
            outbound_capacity: env.nonzero(
                "EVENT_STREAM_OUTBOUND_CAPACITY",
                defaults.outbound_capacity,
            )?,
        };

        let defaults = BusSettings::default();
        let bus = BusSettings {
            topic_capacity: env.nonzero("EVENT_STREAM_TOPIC_CAPACITY", defaults.topic_capacity)?,
            subscription_capacity: env.nonzero(
                "EVENT_STREAM_SUBSCRIPTION_CAPACITY",
                defaults.subscription_capacity,
            )?,
        };

        Ok(Self {
            environment,
            server,
            session,
            bus,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be used.
    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn nonzero<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr + Default + PartialEq,
    {
        let value = self.parse_or(key, default);
        if value == T::default() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: self.get(key).unwrap_or_default(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test_case("production", Environment::Production)]
    #[test_case("PROD", Environment::Production)]
    #[test_case("development", Environment::Development)]
    #[test_case("staging", Environment::Development)]
    fn environment_parsing(raw: &str, expected: Environment) {
        assert_eq!(Environment::from_str_case_insensitive(raw), expected);
    }

    #[test]
    fn defaults_when_unset() {
        let config = StreamConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.grpc_port, 50052);
        assert_eq!(config.server.health_port, 8082);
        assert_eq!(config.session.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.session.outbound_capacity, 256);
        assert_eq!(config.bus.topic_capacity, 1_024);
        assert_eq!(config.bus.subscription_capacity, 64);
    }

    #[test]
    fn overrides_from_environment() {
        let config = StreamConfig::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("EVENT_STREAM_GRPC_PORT", "6000"),
            ("EVENT_STREAM_HEARTBEAT_INTERVAL_SECS", "3"),
            ("EVENT_STREAM_TOPIC_CAPACITY", "32"),
        ]))
        .unwrap();

        assert!(config.environment.is_production());
        assert_eq!(config.server.grpc_port, 6000);
        assert_eq!(config.session.heartbeat_interval, Duration::from_secs(3));
        assert_eq!(config.bus.topic_capacity, 32);
    }

    #[test_case("EVENT_STREAM_GRPC_PORT", "not-a-port")]
    #[test_case("EVENT_STREAM_OUTBOUND_CAPACITY", "-5")]
    #[test_case("EVENT_STREAM_HEARTBEAT_INTERVAL_SECS", " ")]
    fn unparseable_values_fall_back(key: &str, value: &str) {
        let config = StreamConfig::from_lookup(lookup(&[(key, value)])).unwrap();
        assert_eq!(config.server.grpc_port, 50052);
        assert_eq!(config.session.outbound_capacity, 256);
        assert_eq!(config.session.heartbeat_interval, Duration::from_secs(10));
    }

    #[test_case("EVENT_STREAM_HEARTBEAT_INTERVAL_SECS")]
    #[test_case("EVENT_STREAM_OUTBOUND_CAPACITY")]
    #[test_case("EVENT_STREAM_TOPIC_CAPACITY")]
    #[test_case("EVENT_STREAM_SUBSCRIPTION_CAPACITY")]
    fn zero_is_rejected(key: &str) {
        let err = StreamConfig::from_lookup(lookup(&[(key, "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: "0".to_string(),
            }
        );
    }
}
