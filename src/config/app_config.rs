use serde::Deserialize;

use crate::domain::{TransactionalSender, DEFAULT_SAVEPOINT_PREFIX};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// PostgreSQL pool used for transactional sends
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; transactional sends stay in memory when unset
    pub url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Prefix of the savepoints opened around transactional sends
    pub savepoint_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            savepoint_prefix: DEFAULT_SAVEPOINT_PREFIX.to_string(),
        }
    }
}

impl TransactionalSender {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(config.savepoint_prefix.clone())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.idle_timeout_secs, 600);
        assert_eq!(config.chain.savepoint_prefix, "mediator_chain");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [logging]
            format = "json"

            [chain]
            savepoint_prefix = "orders"
            "#,
        );

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.chain.savepoint_prefix, "orders");
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_database_config_from_file() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/orders"
            max_connections = 4
            "#,
        );

        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/orders")
        );
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.database.connect_timeout_secs, 30);
    }

    #[test]
    fn test_sender_from_config() {
        let config = ChainConfig {
            savepoint_prefix: "billing".to_string(),
        };

        let sender = TransactionalSender::from_config(&config);

        assert_eq!(sender.savepoint_prefix(), "billing");
        assert!(sender.savepoint_name().starts_with("billing_"));
    }
}
