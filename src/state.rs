//! Application state for Annex.
//!
//! Contains the shared state that is passed to all handlers.

use std::sync::Arc;

use annex_storage::AttachmentStore;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{AttachmentService, LinkBase, SqliteRecordStore, UploadPolicy};
use crate::Result;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool backing the record store.
    pub db: DbPool,
    /// Attachment synchronization service.
    pub attachments: AttachmentService,
}

impl AppState {
    /// Create the application state from the global configuration.
    pub async fn new() -> Result<Self> {
        Self::from_config(crate::config()).await
    }

    /// Create the application state, opening the database and applying the
    /// schema.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = crate::db::init_pool(&config.database.path).await?;
        crate::db::initialize_schema(&db).await?;
        Self::with_pool(db, config)
    }

    /// Create the application state around an existing pool.
    pub fn with_pool(db: DbPool, config: &Config) -> Result<Self> {
        let store = Arc::new(AttachmentStore::new(&config.storage.attachments_path));
        let records = Arc::new(SqliteRecordStore::new(db.clone()));
        let links = LinkBase::from_config(config.links.proxy_base_url.as_deref())?;
        let policy = UploadPolicy {
            allowed_media_types: config.storage.allowed_media_types.clone(),
            max_size: config.storage.max_attachment_size,
        };

        let attachments =
            AttachmentService::new(store, records, links, policy, config.records.timeout);

        Ok(Self { db, attachments })
    }
}
