use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{MemoryStore, PgStore, Store, StoreError};
use crate::config::{DatabaseConfig, StoreBackend};

/// Connection options with the server-side statement limit applied.
pub fn connect_options(url: &str, config: &DatabaseConfig) -> Result<PgConnectOptions, StoreError> {
    let statement_timeout_ms = config.query_timeout.saturating_mul(1000);
    Ok(PgConnectOptions::from_str(url)?.options([("statement_timeout", statement_timeout_ms.to_string())]))
}

/// Builds the PostgreSQL pool from configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let url = config
        .url
        .as_deref()
        .ok_or(StoreError::ConfigMissing("DATABASE_URL"))?;

    // Validate up front so a typo is reported as configuration, not as a
    // connection failure.
    let parsed = url::Url::parse(url).map_err(|_| StoreError::ConfigMissing("valid DATABASE_URL"))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(connect_options(url, config)?)
        .await?;

    info!(
        "Connected to database {} on {}",
        parsed.path().trim_start_matches('/'),
        parsed.host_str().unwrap_or("localhost")
    );
    Ok(pool)
}

/// Opens the configured store. Postgres stores are migrated before use.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.store {
        StoreBackend::Postgres => {
            let store = PgStore::new(connect(config).await?);
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_needs_no_url() {
        let config = DatabaseConfig {
            store: StoreBackend::Memory,
            url: None,
            max_connections: 1,
            connection_timeout: 1,
            query_timeout: 1,
        };
        let store = open_store(&config).await.unwrap();
        store.ping().await.unwrap();
    }

    #[test]
    fn query_timeout_reaches_connect_options() {
        let config = DatabaseConfig {
            store: StoreBackend::Postgres,
            url: None,
            max_connections: 1,
            connection_timeout: 1,
            query_timeout: 7,
        };
        let options = connect_options("postgres://helpdesk@localhost/helpdesk", &config).unwrap();
        let sent = options.get_options().unwrap_or_default();
        assert!(sent.contains("statement_timeout=7000"), "{}", sent);
    }

    #[tokio::test]
    async fn postgres_store_needs_url() {
        let config = DatabaseConfig {
            store: StoreBackend::Postgres,
            url: None,
            max_connections: 1,
            connection_timeout: 1,
            query_timeout: 1,
        };
        assert!(matches!(
            open_store(&config).await,
            Err(StoreError::ConfigMissing("DATABASE_URL"))
        ));
    }
}
