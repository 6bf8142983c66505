pub mod config;

use sea_orm::{ConnectOptions, Database, DbErr};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schema;
use crate::db::store::{ChannelStore, InMemoryChannelStore, SeaOrmChannelStore};
use crate::server::config::{ServerConfig, StoreKind};

/// Opens the configured channel store; for Postgres this also makes sure the
/// tables exist.
pub async fn build_store(config: &ServerConfig) -> Result<Arc<dyn ChannelStore>, DbErr> {
    match config.store {
        StoreKind::Memory => {
            warn!("Using the in-memory channel store; data is lost on restart.");
            Ok(Arc::new(InMemoryChannelStore::new()))
        }
        StoreKind::Postgres => {
            let database_url = config
                .database_url
                .clone()
                .ok_or_else(|| DbErr::Custom("DATABASE_URL is not set".to_string()))?;
            let mut opt = ConnectOptions::new(database_url);
            opt.max_connections(config.db_max_connections)
                .connect_timeout(config.query_timeout())
                .sqlx_logging(false);

            let db = Database::connect(opt).await?;
            schema::ensure_schema(&db).await?;
            info!("Connected to Postgres channel store.");
            Ok(Arc::new(SeaOrmChannelStore::new(db)))
        }
    }
}
