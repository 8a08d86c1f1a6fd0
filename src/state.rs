use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::Store;
use crate::notify::{EndpointRegistry, WhitelistNotifier};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub endpoints: EndpointRegistry,
    pub notifier: WhitelistNotifier,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let tokens = TokenService::from_config(&config.security)?;
        let notifier = WhitelistNotifier::new(
            Duration::from_secs(config.whitelist.notify_timeout_secs),
            config.whitelist.approval_message.clone(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens: Arc::new(tokens),
            endpoints: EndpointRegistry::new(),
            notifier,
        })
    }
}
