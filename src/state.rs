use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, LogNotifier, Notifier, SeaOrmAuthService, SmtpNotifier};

/// Pick the delivery channel for outbound email.
pub fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    if config.email.enabled {
        let notifier = SmtpNotifier::new(&config.email)
            .map_err(|e| anyhow::anyhow!("Failed to configure SMTP notifier: {e}"))?;
        info!(host = %config.email.host, port = config.email.port, "SMTP email delivery enabled");
        Ok(Arc::new(notifier))
    } else {
        warn!("Email delivery disabled; reset codes will not be sent");
        Ok(Arc::new(LogNotifier::new(config.email.brand_name.clone())))
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let notifier = build_notifier(&config)?;
        Self::with_collaborators(config, notifier, Arc::new(DefaultClock)).await
    }

    /// Build with an explicit notifier and clock instead of the configured ones.
    pub async fn with_collaborators(
        config: Config,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        store.ensure_admin(&config.admin, &config.security).await?;

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            &config,
            notifier,
            clock,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            auth_service,
        })
    }
}
