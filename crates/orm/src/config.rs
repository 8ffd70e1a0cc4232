//! Database configuration
//!
//! Connections are declared by name; one of them is the default. The
//! configuration can come from environment variables, a YAML document, or be
//! built in code.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::{DatabaseBackendRegistry, DatabaseBackendType};

/// Name used for the connection built from `DATABASE_URL`
pub const DEFAULT_CONNECTION: &str = "primary";

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value '{value}' for {field}: expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Unknown connection '{0}'")]
    UnknownConnection(String),

    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a free connection
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600), // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

/// One named connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub client: DatabaseBackendType,
    pub url: String,
    #[serde(default)]
    pub pool: PoolConfig,
    /// Emit every executed statement at `debug` level
    #[serde(default)]
    pub debug: bool,
}

impl ConnectionConfig {
    /// Build a connection config, inferring the client from the URL scheme
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let client = DatabaseBackendRegistry::detect_backend_from_url(url).map_err(|_| ConfigError::InvalidValue {
            field: "url".to_string(),
            value: url.to_string(),
            expected: "a postgres:// or sqlite: URL".to_string(),
        })?;

        Ok(Self {
            client,
            url: url.to_string(),
            pool: PoolConfig::default(),
            debug: false,
        })
    }
}

/// Top-level database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Default connection name
    pub connection: String,
    pub connections: HashMap<String, ConnectionConfig>,
}

impl DatabaseConfig {
    /// Configuration with a single connection that is also the default
    pub fn single(name: &str, url: &str) -> Result<Self, ConfigError> {
        let mut connections = HashMap::new();
        connections.insert(name.to_string(), ConnectionConfig::from_url(url)?);

        Ok(Self {
            connection: name.to_string(),
            connections,
        })
    }

    /// Load configuration from environment variables
    ///
    /// `DATABASE_URL` is required. `DB_CONNECTION` names the connection
    /// (default `primary`), `DB_DEBUG` enables statement logging and
    /// `DB_POOL_MAX` / `DB_POOL_MIN` size the pool.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingRequired {
            field: "DATABASE_URL".to_string(),
        })?;
        let name = env::var("DB_CONNECTION").unwrap_or_else(|_| DEFAULT_CONNECTION.to_string());

        let mut connection = ConnectionConfig::from_url(&url)?;
        if let Ok(debug) = env::var("DB_DEBUG") {
            connection.debug = parse_bool("DB_DEBUG", &debug)?;
        }
        if let Ok(max) = env::var("DB_POOL_MAX") {
            connection.pool.max_connections = parse_number("DB_POOL_MAX", &max)?;
        }
        if let Ok(min) = env::var("DB_POOL_MIN") {
            connection.pool.min_connections = parse_number("DB_POOL_MIN", &min)?;
        }

        let mut connections = HashMap::new();
        connections.insert(name.clone(), connection);

        let config = Self {
            connection: name,
            connections,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.connections.contains_key(&self.connection) {
            return Err(ConfigError::UnknownConnection(self.connection.clone()));
        }

        for (name, connection) in &self.connections {
            if connection.url.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("connections.{}.url", name),
                });
            }

            let detected = DatabaseBackendRegistry::detect_backend_from_url(&connection.url).ok();
            if detected != Some(connection.client) {
                return Err(ConfigError::InvalidValue {
                    field: format!("connections.{}.url", name),
                    value: connection.url.clone(),
                    expected: format!("a {} URL", connection.client),
                });
            }

            if connection.pool.min_connections > connection.pool.max_connections {
                return Err(ConfigError::InvalidValue {
                    field: format!("connections.{}.pool.min_connections", name),
                    value: connection.pool.min_connections.to_string(),
                    expected: format!("at most max_connections ({})", connection.pool.max_connections),
                });
            }
        }

        Ok(())
    }

    /// Get a connection by name
    pub fn get(&self, name: &str) -> Result<&ConnectionConfig, ConfigError> {
        self.connections
            .get(name)
            .ok_or_else(|| ConfigError::UnknownConnection(name.to_string()))
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "a boolean".to_string(),
        }),
    }
}

fn parse_number(field: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: "a positive integer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_connection_config() {
        let config = DatabaseConfig::single("primary", "sqlite::memory:").unwrap();
        assert_eq!(config.connection, "primary");
        assert_eq!(config.get("primary").unwrap().client, DatabaseBackendType::SQLite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
connection: pg
connections:
  pg:
    client: postgres
    url: postgres://localhost/app
    debug: true
    pool:
      max_connections: 4
  cache:
    client: sqlite
    url: "sqlite::memory:"
"#;
        let config = DatabaseConfig::from_yaml_str(yaml).unwrap();
        let pg = config.get("pg").unwrap();
        assert_eq!(pg.client, DatabaseBackendType::PostgreSQL);
        assert!(pg.debug);
        assert_eq!(pg.pool.max_connections, 4);
        assert_eq!(pg.pool.min_connections, 1);
        assert_eq!(config.get("cache").unwrap().client, DatabaseBackendType::SQLite);
    }

    #[test]
    fn test_unknown_default_connection_rejected() {
        let mut config = DatabaseConfig::single("primary", "sqlite::memory:").unwrap();
        config.connection = "reporting".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownConnection(name)) if name == "reporting"));
    }

    #[test]
    fn test_client_url_mismatch_rejected() {
        let mut config = DatabaseConfig::single("primary", "sqlite::memory:").unwrap();
        config.connections.get_mut("primary").unwrap().client = DatabaseBackendType::PostgreSQL;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_pool_bounds_rejected() {
        let mut config = DatabaseConfig::single("primary", "sqlite::memory:").unwrap();
        let pool = &mut config.connections.get_mut("primary").unwrap().pool;
        pool.min_connections = 5;
        pool.max_connections = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool_values() {
        assert!(parse_bool("DB_DEBUG", "TRUE").unwrap());
        assert!(!parse_bool("DB_DEBUG", "off").unwrap());
        assert!(parse_bool("DB_DEBUG", "maybe").is_err());
    }
}
