use crate::cli::{utils::output_success, OutputFormat};
use crate::config::{AppConfig, StoreBackend};
use crate::database::{manager, PgStore};

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    crate::server::serve(config).await
}

pub async fn migrate(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.database.store != StoreBackend::Postgres {
        anyhow::bail!("Migrations only apply to the postgres store");
    }

    let store = PgStore::new(manager::connect(&config.database).await?);
    store.migrate().await?;

    output_success(output_format, "Migrations applied", None)
}
