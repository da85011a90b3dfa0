//! Sample JSON:API module: organizations, users and teams kept in memory.

pub mod api;
pub mod config;
pub mod contract;
pub mod domain;

use std::sync::Arc;

use jsonapi_kit::{JsonApi, RegistrationError};
use runtime::AppConfig;

pub use config::{AccountsConfig, MODULE_NAME};
use domain::service::{Service, ServiceConfig};

pub struct AccountsModule {
    service: Arc<Service>,
    config: AccountsConfig,
}

impl AccountsModule {
    pub fn new(config: AccountsConfig) -> Self {
        let service = Service::new(ServiceConfig {
            max_name_length: config.max_name_length,
        });
        Self {
            service: Arc::new(service),
            config,
        }
    }

    /// Reads `modules.accounts`; a missing section means defaults.
    pub fn from_app_config(app: &AppConfig) -> anyhow::Result<Self> {
        let config: AccountsConfig = app.module_config(MODULE_NAME)?;
        tracing::debug!(?config, "accounts module configured");
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    pub fn register(&self, app: &mut JsonApi) -> Result<(), RegistrationError> {
        api::rest::routes::register_routes(app, self.service.clone(), &self.config)
    }
}
