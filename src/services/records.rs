//! Record store access for link list fields.
//!
//! The attachment service only needs four things from a record store: check
//! that an identifier names something that exists, select exactly one
//! record, and read or write one of its fields. [`RecordLinkStore`] captures
//! that contract; [`SqliteRecordStore`] implements it on the local database.

use async_trait::async_trait;
use tracing::debug;

use annex_storage::ResourceIdentifier;

use crate::db::{self, DbPool, Record};
use crate::error::{Error, Result};

/// Contract the attachment service requires of a record store.
///
/// Implementations are shared between concurrent requests.
#[async_trait]
pub trait RecordLinkStore: Send + Sync {
    /// Fail with `NotFound` naming the first level of `id` that does not exist.
    async fn ensure_exists(&self, id: &ResourceIdentifier) -> Result<()>;

    /// Select the single record with this id.
    ///
    /// Zero or several matches is an `InvariantViolation`: the identifier
    /// has already been checked by the time this is called.
    async fn fetch_one(&self, workspace: &str, collection: &str, record_id: &str)
        -> Result<Record>;

    /// Current value of a field, `None` if unset.
    async fn read_field(&self, record: &Record, field: &str) -> Result<Option<String>>;

    /// Replace a field's value; `None` clears it.
    ///
    /// Fails with `Unsupported` when the collection is read-only.
    async fn write_field(&self, record: &Record, field: &str, value: Option<&str>) -> Result<()>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Record store backed by the local SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: DbPool,
}

impl SqliteRecordStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    async fn require_field(&self, workspace: &str, collection: &str, field: &str) -> Result<()> {
        if db::collection_has_field(&self.db, workspace, collection, field).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "No such field: {},{},{}",
                workspace, collection, field
            )))
        }
    }
}

#[async_trait]
impl RecordLinkStore for SqliteRecordStore {
    async fn ensure_exists(&self, id: &ResourceIdentifier) -> Result<()> {
        let ws = id.workspace();
        if !db::workspace_exists(&self.db, ws).await? {
            return Err(Error::NotFound(format!("No such workspace: {}", ws)));
        }

        let Some(collection) = id.collection() else {
            return Ok(());
        };
        if db::get_collection(&self.db, ws, collection).await?.is_none() {
            return Err(Error::NotFound(format!(
                "No such collection: {},{}",
                ws, collection
            )));
        }

        let Some(record_id) = id.record_id() else {
            return Ok(());
        };
        if db::find_records(&self.db, ws, collection, record_id)
            .await?
            .is_empty()
        {
            return Err(Error::NotFound(format!(
                "No such record: {},{},{}",
                ws, collection, record_id
            )));
        }

        if let Some(field) = id.field() {
            self.require_field(ws, collection, field).await?;
        }

        Ok(())
    }

    async fn fetch_one(
        &self,
        workspace: &str,
        collection: &str,
        record_id: &str,
    ) -> Result<Record> {
        let mut records = db::find_records(&self.db, workspace, collection, record_id).await?;
        if records.len() != 1 {
            return Err(Error::InvariantViolation(format!(
                "filter did not select exactly one record ({} matched {},{},{})",
                records.len(),
                workspace,
                collection,
                record_id
            )));
        }
        Ok(records.remove(0))
    }

    async fn read_field(&self, record: &Record, field: &str) -> Result<Option<String>> {
        self.require_field(&record.workspace, &record.collection, field)
            .await?;
        db::get_field_value(&self.db, record.id, field).await
    }

    async fn write_field(&self, record: &Record, field: &str, value: Option<&str>) -> Result<()> {
        let collection = db::get_collection(&self.db, &record.workspace, &record.collection)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "No such collection: {},{}",
                    record.workspace, record.collection
                ))
            })?;

        if !collection.writable {
            return Err(Error::Unsupported(format!(
                "collection {},{} is read-only",
                record.workspace, record.collection
            )));
        }

        self.require_field(&record.workspace, &record.collection, field)
            .await?;
        db::set_field_value(&self.db, record.id, field, value).await?;

        debug!(
            record = %record.record_id,
            field,
            cleared = value.is_none(),
            "Wrote link field"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        db::health_check(&self.db).await
    }
}
