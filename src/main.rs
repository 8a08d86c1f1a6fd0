#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();
    helpdesk_api::init_tracing();

    let config = helpdesk_api::config::config().clone();
    tracing::info!("Starting Helpdesk API in {:?} mode", config.environment);

    helpdesk_api::server::serve(config).await
}
