use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::auth::MAX_TOKEN_EXPIRY_HOURS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub whitelist: WhitelistConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub api_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub store: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// Per-statement limit in seconds, enforced by the server.
    pub query_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapOperator {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub cors_origins: Vec<String>,
    pub bootstrap_operator: Option<BootstrapOperator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistConfig {
    pub notify_timeout_secs: u64,
    pub approval_message: String,
    /// Origin tags accepted on submission. Empty accepts any tag.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingJwtSecret,

    #[error("DATABASE_URL must be set when the postgres store is selected")]
    MissingDatabaseUrl,

    #[error("SECURITY_JWT_EXPIRY_HOURS must be between 1 and {max}, got {value}")]
    InvalidJwtExpiry { value: u64, max: u64 },

    #[error("DATABASE_QUERY_TIMEOUT must be greater than zero")]
    InvalidQueryTimeout,

    #[error("Unknown store backend: {0}")]
    UnknownStore(String),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        Self::for_environment(environment).with_env_overrides()
    }

    /// Defaults for an environment, without reading any variables.
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("HELPDESK_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("HELPDESK_API_PREFIX") {
            self.server.api_prefix = v;
        }

        // Database overrides
        if let Ok(v) = env::var("HELPDESK_STORE") {
            match v.parse() {
                Ok(store) => self.database.store = store,
                Err(e) => tracing::warn!("Ignoring HELPDESK_STORE: {}", e),
            }
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_QUERY_TIMEOUT") {
            self.database.query_timeout = v.parse().unwrap_or(self.database.query_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let (Ok(username), Ok(password)) = (
            env::var("BOOTSTRAP_OPERATOR_USERNAME"),
            env::var("BOOTSTRAP_OPERATOR_PASSWORD"),
        ) {
            self.security.bootstrap_operator = Some(BootstrapOperator { username, password });
        }

        // Whitelist overrides
        if let Ok(v) = env::var("WHITELIST_NOTIFY_TIMEOUT_SECS") {
            self.whitelist.notify_timeout_secs = v.parse().unwrap_or(self.whitelist.notify_timeout_secs);
        }
        if let Ok(v) = env::var("WHITELIST_APPROVAL_MESSAGE") {
            self.whitelist.approval_message = v;
        }
        if let Ok(v) = env::var("WHITELIST_ALLOWED_ORIGINS") {
            self.whitelist.allowed_origins = split_list(&v);
        }

        self
    }

    /// Checks the settings that cannot be defaulted safely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.database.store == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        let expiry = self.security.jwt_expiry_hours;
        if expiry == 0 || expiry > MAX_TOKEN_EXPIRY_HOURS {
            return Err(ConfigError::InvalidJwtExpiry {
                value: expiry,
                max: MAX_TOKEN_EXPIRY_HOURS,
            });
        }
        if self.database.query_timeout == 0 {
            return Err(ConfigError::InvalidQueryTimeout);
        }
        Ok(())
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.whitelist.allowed_origins.is_empty()
            || self.whitelist.allowed_origins.iter().any(|o| o == origin)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                api_prefix: "/api".to_string(),
            },
            database: DatabaseConfig {
                store: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                query_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: "helpdesk-development-secret".to_string(),
                jwt_expiry_hours: 24,
                cors_origins: vec![
                    "http://localhost:8000".to_string(),
                    "http://localhost:8001".to_string(),
                ],
                bootstrap_operator: Some(BootstrapOperator {
                    username: "operator1".to_string(),
                    password: "securepassword".to_string(),
                }),
            },
            whitelist: WhitelistConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 8080,
                api_prefix: "/api".to_string(),
            },
            database: DatabaseConfig {
                store: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                query_timeout: 15,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: vec!["https://staging.example.com".to_string()],
                bootstrap_operator: None,
            },
            whitelist: WhitelistConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8080,
                api_prefix: "/api".to_string(),
            },
            database: DatabaseConfig {
                store: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                query_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: Vec::new(),
                bootstrap_operator: None,
            },
            whitelist: WhitelistConfig::default(),
        }
    }
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            notify_timeout_secs: 10,
            approval_message: "Your access request has been approved".to_string(),
            allowed_origins: ["dev", "ift", "psi", "prom"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::UnknownStore(other.to_string())),
        }
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
