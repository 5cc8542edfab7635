use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    services::{gateway::PaymentGateway, notification::NotificationQueue},
};

/// Shared handles every request handler and service receives.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifications: NotificationQueue,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        orm: OrmConn,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            pool,
            orm,
            config: Arc::new(config),
            gateway,
            notifications,
        }
    }
}
