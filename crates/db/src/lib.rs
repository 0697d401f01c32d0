//! Document storage for blobhub.
//!
//! [`store`] holds the transactional key-document store and its backends,
//! [`entities`] the typed documents with their paths, and [`repositories`]
//! typed reads that do not need a transaction.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod store;
pub mod test_utils;

pub use store::{Direction, DocumentStore, Query, Snapshot, Transaction};

use blobhub_common::{AppError, Config, config::StoreBackend};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let url = config
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::Config("database.url is not set".to_string()))?;
    let mut opt = ConnectOptions::new(url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Open the configured backend and wrap it in a store.
///
/// The postgres backend is connected and migrated before it is returned.
pub async fn open_store(config: &Config) -> Result<DocumentStore, AppError> {
    let store = match config.database.backend {
        StoreBackend::Memory => {
            info!("Using in-memory document store; data is lost on restart");
            DocumentStore::in_memory()
        }
        StoreBackend::Postgres => {
            let db = init(config).await?;
            migrate(&db).await?;
            info!("Connected to PostgreSQL document store");
            DocumentStore::new(Arc::new(store::SqlBackend::new(Arc::new(db))))
        }
    };
    Ok(store.with_max_attempts(config.storage.transaction_max_attempts))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_store_defaults_to_memory() {
        let config: Config = serde_json::from_value(serde_json::json!({})).unwrap();
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.max_attempts(), 5);
        assert!(store.get("blobs/none").await.unwrap().is_none());
    }
}
