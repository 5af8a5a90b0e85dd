use std::sync::Arc;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::database::memory::MemoryStore;
use crate::database::postgres::PgDocumentStore;
use crate::database::store::{DocumentStore, StoreError};

/// Builds the shared store handle from configuration
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open the configured backend. Postgres connects eagerly so bad settings fail at startup.
    pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreBackend::Postgres => {
                let pool = Self::pool(config).await?;
                info!(
                    "Connected to PostgreSQL database: {}",
                    config.name.as_deref().unwrap_or_default()
                );
                Ok(Arc::new(PgDocumentStore::new(pool)))
            }
        }
    }

    async fn pool(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
        let connection_string = Self::build_connection_string(config)?;
        let statement_timeout = config.socket_timeout_ms.to_string();
        let options = connection_string
            .parse::<PgConnectOptions>()
            .map_err(|e| StoreError::InvalidConnectionString(e.to_string()))?
            .options([("statement_timeout", statement_timeout.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(config.max_idle())
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    /// Combine `DB_CON_STRING` with credentials and the database name
    fn build_connection_string(config: &DatabaseConfig) -> Result<String, StoreError> {
        let base = config
            .connection_string
            .as_deref()
            .ok_or(StoreError::ConfigMissing("DB_CON_STRING"))?;
        let name = config.name.as_deref().ok_or(StoreError::ConfigMissing("DB_NAME"))?;

        let mut url = url::Url::parse(base).map_err(|e| StoreError::InvalidConnectionString(e.to_string()))?;
        if let Some(username) = config.username.as_deref() {
            url.set_username(username)
                .map_err(|_| StoreError::InvalidConnectionString("cannot set username".to_string()))?;
        }
        if let Some(password) = config.password.as_deref() {
            url.set_password(Some(password))
                .map_err(|_| StoreError::InvalidConnectionString("cannot set password".to_string()))?;
        }
        // Replace the path to the database name (ensure leading slash)
        url.set_path(&format!("/{}", name));
        Ok(url.into_string())
    }
}
