//! Environment-driven configuration for the API server.

use serde::Deserialize;

/// Deployment environment, selecting log format and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: pretty logs, debug level.
    #[default]
    Development,
    /// Production: JSON logs, info level.
    Production,
}

impl Environment {
    /// Whether this is a development environment.
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Which state-store strategy to construct at startup.
///
/// The choice is made once, from configuration, and injected into the state;
/// call sites never consult a global flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Durable Postgres store.
    #[default]
    Postgres,
    /// In-memory fixture store (tests, local development without a database).
    Memory,
}

/// API configuration, deserialized from environment variables by `envy`
/// (field names map to their UPPER_SNAKE_CASE variables).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Connection string; required unless the memory backend is selected.
    pub database_url: Option<String>,
    /// Port the server binds to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deployment environment.
    #[serde(default)]
    pub env: Environment,
    /// State-store strategy.
    #[serde(default)]
    pub store_backend: StoreBackend,
    /// Connection pool size for the Postgres backend.
    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_db_connections() -> u32 {
    10
}

impl ApiConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ApiConfig = envy::from_iter(std::iter::empty::<(String, String)>()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.env, Environment::Development);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.max_db_connections, 10);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_backend_and_environment_parsing() {
        let config: ApiConfig = envy::from_iter([
            ("STORE_BACKEND".to_string(), "memory".to_string()),
            ("ENV".to_string(), "production".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ])
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.env, Environment::Production);
        assert!(!config.env.is_development());
        assert_eq!(config.port, 8080);
    }
}
