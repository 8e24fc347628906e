//! Record store queries.
//!
//! Workspaces contain collections; a collection declares its fields and
//! holds records. Field values are stored per record and field, and are
//! nullable.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DbPool;

// ============================================================================
// Types
// ============================================================================

/// Collection record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Collection {
    pub workspace: String,
    pub name: String,
    pub writable: bool,
    pub created_at: String,
}

/// One stored record. `id` is the row key, `record_id` the caller-facing id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub workspace: String,
    pub collection: String,
    pub record_id: String,
    pub created_at: String,
}

/// Input for creating a new collection.
#[derive(Debug, Clone)]
pub struct CreateCollection {
    pub workspace: String,
    pub name: String,
    pub writable: bool,
    pub fields: Vec<String>,
}

/// Input for creating a new record.
#[derive(Debug, Clone, Default)]
pub struct CreateRecord {
    pub workspace: String,
    pub collection: String,
    pub record_id: String,
    pub values: Vec<(String, Option<String>)>,
}

// ============================================================================
// Workspaces
// ============================================================================

/// Create a workspace. Existing workspaces are left untouched.
pub async fn create_workspace(pool: &DbPool, name: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO workspaces (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn workspace_exists(pool: &DbPool, name: &str) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as("SELECT name FROM workspaces WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

// ============================================================================
// Collections
// ============================================================================

/// Create a collection with its declared fields.
pub async fn create_collection(pool: &DbPool, input: CreateCollection) -> Result<Collection> {
    let mut tx = pool.begin().await?;

    let collection = sqlx::query_as::<_, Collection>(
        r#"
        INSERT INTO collections (workspace, name, writable)
        VALUES (?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.workspace)
    .bind(&input.name)
    .bind(input.writable)
    .fetch_one(&mut *tx)
    .await?;

    for field in &input.fields {
        sqlx::query(
            "INSERT OR IGNORE INTO collection_fields (workspace, collection, name) VALUES (?, ?, ?)",
        )
        .bind(&input.workspace)
        .bind(&input.name)
        .bind(field)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(collection)
}

/// Get a collection (optional).
pub async fn get_collection(
    pool: &DbPool,
    workspace: &str,
    name: &str,
) -> Result<Option<Collection>> {
    sqlx::query_as::<_, Collection>("SELECT * FROM collections WHERE workspace = ? AND name = ?")
        .bind(workspace)
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Check whether a collection declares a field.
pub async fn collection_has_field(
    pool: &DbPool,
    workspace: &str,
    collection: &str,
    field: &str,
) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT name FROM collection_fields WHERE workspace = ? AND collection = ? AND name = ?",
    )
    .bind(workspace)
    .bind(collection)
    .bind(field)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

// ============================================================================
// Records
// ============================================================================

/// Create a record with initial field values.
pub async fn create_record(pool: &DbPool, input: CreateRecord) -> Result<Record> {
    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, Record>(
        r#"
        INSERT INTO records (workspace, collection, record_id)
        VALUES (?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.workspace)
    .bind(&input.collection)
    .bind(&input.record_id)
    .fetch_one(&mut *tx)
    .await?;

    for (field, value) in &input.values {
        sqlx::query("INSERT INTO record_values (record, field, value) VALUES (?, ?, ?)")
            .bind(record.id)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(record)
}

/// All records matching a caller-facing id.
/// Uses idx_records_lookup index.
pub async fn find_records(
    pool: &DbPool,
    workspace: &str,
    collection: &str,
    record_id: &str,
) -> Result<Vec<Record>> {
    sqlx::query_as::<_, Record>(
        r#"
        SELECT * FROM records
        WHERE workspace = ? AND collection = ? AND record_id = ?
        ORDER BY id
        "#,
    )
    .bind(workspace)
    .bind(collection)
    .bind(record_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Current value of a field. Absent rows and NULL both read as `None`.
pub async fn get_field_value(pool: &DbPool, record: i64, field: &str) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM record_values WHERE record = ? AND field = ?")
            .bind(record)
            .bind(field)
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(value,)| value))
}

/// Set (or clear, with `None`) a field value.
pub async fn set_field_value(
    pool: &DbPool,
    record: i64,
    field: &str,
    value: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO record_values (record, field, value, updated_at)
        VALUES (?, ?, ?, datetime('now'))
        ON CONFLICT (record, field)
        DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(record)
    .bind(field)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_pool, initialize_schema};

    async fn setup() -> DbPool {
        let pool = init_pool(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        create_workspace(&pool, "ws1").await.unwrap();
        create_collection(
            &pool,
            CreateCollection {
                workspace: "ws1".into(),
                name: "roads".into(),
                writable: true,
                fields: vec!["photos".into(), "name".into()],
            },
        )
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_collection_lookup() {
        let pool = setup().await;

        assert!(workspace_exists(&pool, "ws1").await.unwrap());
        assert!(!workspace_exists(&pool, "ws2").await.unwrap());

        let collection = get_collection(&pool, "ws1", "roads").await.unwrap().unwrap();
        assert!(collection.writable);
        assert!(get_collection(&pool, "ws1", "rivers").await.unwrap().is_none());

        assert!(collection_has_field(&pool, "ws1", "roads", "photos").await.unwrap());
        assert!(!collection_has_field(&pool, "ws1", "roads", "width").await.unwrap());
    }

    #[tokio::test]
    async fn test_field_values() {
        let pool = setup().await;
        let record = create_record(
            &pool,
            CreateRecord {
                workspace: "ws1".into(),
                collection: "roads".into(),
                record_id: "7".into(),
                values: vec![("name".into(), Some("Main St".into()))],
            },
        )
        .await
        .unwrap();

        assert_eq!(
            get_field_value(&pool, record.id, "name").await.unwrap(),
            Some("Main St".to_string())
        );
        assert_eq!(get_field_value(&pool, record.id, "photos").await.unwrap(), None);

        set_field_value(&pool, record.id, "photos", Some("a,b")).await.unwrap();
        assert_eq!(
            get_field_value(&pool, record.id, "photos").await.unwrap(),
            Some("a,b".to_string())
        );

        set_field_value(&pool, record.id, "photos", None).await.unwrap();
        assert_eq!(get_field_value(&pool, record.id, "photos").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_records_returns_duplicates() {
        let pool = setup().await;
        for _ in 0..2 {
            create_record(
                &pool,
                CreateRecord {
                    workspace: "ws1".into(),
                    collection: "roads".into(),
                    record_id: "dup".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(find_records(&pool, "ws1", "roads", "dup").await.unwrap().len(), 2);
        assert!(find_records(&pool, "ws1", "roads", "none").await.unwrap().is_empty());
    }
}
