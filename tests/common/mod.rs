//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use annex::config::{
    Config, DatabaseConfig, LinkConfig, RecordStoreConfig, ServerConfig, StorageConfig,
};
use annex::db::{self, CreateCollection, CreateRecord, DbPool};
use annex::{api, AppState};
use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

/// Links produced by the test server start with this base.
pub const LINK_BASE: &str = "http://maps.test/attachments";

/// Upload limit used by the test server.
pub const MAX_UPLOAD: usize = 64 * 1024;

/// A running test server and the temporary storage root behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub db: DbPool,
    storage: TempDir,
}

pub fn test_config(storage: &TempDir) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            public_url: "http://localhost:8080".into(),
        },
        database: DatabaseConfig {
            path: ":memory:".into(),
        },
        storage: StorageConfig {
            attachments_path: storage.path().to_string_lossy().into_owned(),
            max_attachment_size: MAX_UPLOAD,
            allowed_media_types: vec!["image/*".into(), "application/pdf".into()],
        },
        links: LinkConfig {
            proxy_base_url: Some(LINK_BASE.into()),
        },
        records: RecordStoreConfig {
            timeout: Duration::from_secs(5),
        },
    }
}

/// Seed a workspace `ws1` with a writable `store1` collection and a
/// read-only `archive` collection, each holding record `7` with an empty
/// `photos` field.
pub async fn seed(pool: &DbPool) {
    db::create_workspace(pool, "ws1").await.unwrap();
    for (name, writable) in [("store1", true), ("archive", false)] {
        db::create_collection(
            pool,
            CreateCollection {
                workspace: "ws1".into(),
                name: name.into(),
                writable,
                fields: vec!["photos".into(), "notes".into()],
            },
        )
        .await
        .unwrap();
        db::create_record(
            pool,
            CreateRecord {
                workspace: "ws1".into(),
                collection: name.into(),
                record_id: "7".into(),
                values: vec![("photos".into(), Some(String::new()))],
            },
        )
        .await
        .unwrap();
    }
}

pub async fn spawn_app() -> TestApp {
    let storage = TempDir::new().unwrap();
    let config = test_config(&storage);

    let state = AppState::from_config(&config).await.unwrap();
    seed(&state.db).await;

    let app = Router::new()
        .merge(api::routes(config.storage.max_attachment_size))
        .with_state(state.clone());
    let server = TestServer::new(app).unwrap();

    TestApp {
        server,
        db: state.db.clone(),
        state,
        storage,
    }
}

impl TestApp {
    pub fn storage_root(&self) -> &std::path::Path {
        self.storage.path()
    }

    /// Current value of a field of record `7`.
    pub async fn field(&self, collection: &str, field: &str) -> Option<String> {
        let records = db::find_records(&self.db, "ws1", collection, "7")
            .await
            .unwrap();
        db::get_field_value(&self.db, records[0].id, field)
            .await
            .unwrap()
    }
}

/// Smallest payload that looks like a JPEG.
pub fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0xFF, 0xD9]
}

pub fn png_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
}
