//! Attachment service.
//!
//! Keeps the files stored for a record field and the field's link list in
//! step. Every operation is a single pass:
//!
//! - Upload: store the file under a fresh name, then append its link.
//! - Fetch: read a stored file back.
//! - DeleteOne: delete the file, then remove its link.
//! - DeleteAll: delete the field's directory, then clear the field.
//! - List: stored files next to the links currently in the field.
//!
//! The filesystem write and the field write are independent side effects.
//! When the second fails after the first succeeded nothing is rolled back;
//! the error is returned and the inconsistency is logged with enough detail
//! to reconcile it by hand.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use annex_storage::identifier::validate_segment;
use annex_storage::layout::file_name;
use annex_storage::{resolve_directory, resolve_file, AttachmentStore, Mime, ResourceIdentifier};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Error, Result};

use super::link_list;
use super::links::{build_link, LinkBase};
use super::locks::FieldLocks;
use super::records::RecordLinkStore;

// ============================================================================
// Operations
// ============================================================================

/// One request against a field's attachments, chosen by the caller.
#[derive(Debug, Clone)]
pub enum AttachmentOperation {
    Upload { media_type: String, content: Vec<u8> },
    Fetch { filename: String, format: String },
    DeleteOne { filename: String, format: String },
    DeleteAll,
    List,
}

impl AttachmentOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Fetch { .. } => "fetch",
            Self::DeleteOne { .. } => "delete_one",
            Self::DeleteAll => "delete_all",
            Self::List => "list",
        }
    }
}

/// Result of an [`AttachmentOperation`].
#[derive(Debug)]
pub enum AttachmentOutcome {
    Created(UploadedAttachment),
    File(AttachmentFile),
    Deleted(DeletedAttachment),
    Cleared(ClearedAttachments),
    Listing(AttachmentListing),
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedAttachment {
    pub filename: String,
    pub link: String,
    pub media_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub filename: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedAttachment {
    pub filename: String,
    /// False when the file was already gone.
    pub file_removed: bool,
    /// False when the field did not hold the file's link.
    pub link_removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearedAttachments {
    pub directory_removed: bool,
    pub links_cleared: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListedFile {
    pub filename: String,
    pub media_type: String,
    pub size: u64,
    pub link: String,
    /// Whether the field currently holds this file's link.
    pub linked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentListing {
    pub files: Vec<ListedFile>,
    pub links: Vec<String>,
}

// ============================================================================
// Policy and statistics
// ============================================================================

/// What an upload must satisfy before anything is written.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// `type/subtype` or `type/*` entries, lower case.
    pub allowed_media_types: Vec<String>,
    pub max_size: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_media_types: vec!["image/*".to_string()],
            max_size: 10 * 1024 * 1024,
        }
    }
}

impl UploadPolicy {
    /// Parse a declared media type and check it against the allowed list.
    ///
    /// The type must be concrete: wildcards name no file extension.
    pub fn check_media_type(&self, declared: &str) -> Result<Mime> {
        let mime: Mime = declared
            .parse()
            .map_err(|_| Error::BadMediaType(declared.to_string()))?;

        if mime.type_().as_str() == "*" || mime.subtype().as_str() == "*" {
            return Err(Error::BadMediaType(format!(
                "{} is not a concrete media type",
                declared
            )));
        }

        let essence = mime.essence_str().to_ascii_lowercase();
        let family = format!("{}/*", mime.type_().as_str().to_ascii_lowercase());

        let allowed = self
            .allowed_media_types
            .iter()
            .any(|a| a == "*/*" || *a == essence || *a == family);

        if allowed {
            Ok(mime)
        } else {
            Err(Error::BadMediaType(declared.to_string()))
        }
    }

    pub fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_size {
            return Err(Error::FileTooLarge {
                max_size: self.max_size,
            });
        }
        Ok(())
    }
}

/// Counters exposed on the metrics endpoint.
#[derive(Debug, Default)]
pub struct AttachmentStats {
    uploads: AtomicU64,
    fetches: AtomicU64,
    deletions: AtomicU64,
    clears: AtomicU64,
    link_sync_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsSnapshot {
    pub uploads: u64,
    pub fetches: u64,
    pub deletions: u64,
    pub clears: u64,
    pub link_sync_failures: u64,
}

impl AttachmentStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            link_sync_failures: self.link_sync_failures.load(Ordering::Relaxed),
        }
    }

    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Service
// ============================================================================

/// Link list value before and after one update.
struct LinkUpdate {
    before: Option<String>,
    after: Option<String>,
}

/// Service coordinating attachment files and record link fields.
#[derive(Clone)]
pub struct AttachmentService {
    store: Arc<AttachmentStore>,
    records: Arc<dyn RecordLinkStore>,
    links: LinkBase,
    locks: FieldLocks,
    policy: UploadPolicy,
    record_timeout: Duration,
    stats: Arc<AttachmentStats>,
}

impl AttachmentService {
    /// Create a new attachment service.
    pub fn new(
        store: Arc<AttachmentStore>,
        records: Arc<dyn RecordLinkStore>,
        links: LinkBase,
        policy: UploadPolicy,
        record_timeout: Duration,
    ) -> Self {
        Self {
            store,
            records,
            links,
            locks: FieldLocks::new(),
            policy,
            record_timeout,
            stats: Arc::new(AttachmentStats::default()),
        }
    }

    pub fn store(&self) -> &AttachmentStore {
        &self.store
    }

    pub fn records(&self) -> &dyn RecordLinkStore {
        self.records.as_ref()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one operation. `request_base` is the base URL of the current
    /// request, used for links unless a proxy base is configured.
    pub async fn execute(
        &self,
        id: &ResourceIdentifier,
        request_base: &str,
        operation: AttachmentOperation,
    ) -> Result<AttachmentOutcome> {
        match operation {
            AttachmentOperation::Upload {
                media_type,
                content,
            } => self
                .upload(id, request_base, &media_type, &content)
                .await
                .map(AttachmentOutcome::Created),
            AttachmentOperation::Fetch { filename, format } => self
                .fetch(id, &filename, &format)
                .await
                .map(AttachmentOutcome::File),
            AttachmentOperation::DeleteOne { filename, format } => self
                .delete_one(id, request_base, &filename, &format)
                .await
                .map(AttachmentOutcome::Deleted),
            AttachmentOperation::DeleteAll => {
                self.delete_all(id).await.map(AttachmentOutcome::Cleared)
            }
            AttachmentOperation::List => self
                .list(id, request_base)
                .await
                .map(AttachmentOutcome::Listing),
        }
    }

    /// Store a new file for a field and append its link.
    pub async fn upload(
        &self,
        id: &ResourceIdentifier,
        request_base: &str,
        media_type: &str,
        content: &[u8],
    ) -> Result<UploadedAttachment> {
        require_field_level(id)?;
        let mime = self.policy.check_media_type(media_type)?;
        self.policy.check_size(content.len())?;
        self.bounded(self.records.ensure_exists(id)).await?;

        let directory = self
            .store
            .find_or_create_directory(&resolve_directory(id))
            .await?;
        let stored = self.store.write_unique(&directory, &mime, content).await?;
        let link = build_link(self.links.resolve(request_base), id, &stored.filename)?;

        if let Err(e) = self
            .update_links(id, |current| Some(link_list::append(current, &link)))
            .await
        {
            AttachmentStats::inc(&self.stats.link_sync_failures);
            error!(
                identifier = %id,
                orphan = %directory.join(&stored.filename).display(),
                error = %e,
                "Attachment stored but its link was not recorded"
            );
            return Err(e);
        }

        AttachmentStats::inc(&self.stats.uploads);
        info!(identifier = %id, filename = %stored.filename, "Uploaded attachment");

        Ok(UploadedAttachment {
            filename: stored.filename,
            link,
            media_type: stored.media_type,
            size: stored.size,
        })
    }

    /// Read a stored file.
    pub async fn fetch(
        &self,
        id: &ResourceIdentifier,
        filename: &str,
        format: &str,
    ) -> Result<AttachmentFile> {
        require_field_level(id)?;
        let segments = file_segments(id, filename, format)?;

        let data = self.store.read(&segments).await?;
        let media_type = mime_guess::from_ext(format)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        AttachmentStats::inc(&self.stats.fetches);

        Ok(AttachmentFile {
            filename: file_name(filename, format),
            media_type,
            data,
        })
    }

    /// Delete one file and remove its link.
    ///
    /// A file that is already gone does not stop the link from being
    /// removed.
    pub async fn delete_one(
        &self,
        id: &ResourceIdentifier,
        request_base: &str,
        filename: &str,
        format: &str,
    ) -> Result<DeletedAttachment> {
        require_field_level(id)?;
        let segments = file_segments(id, filename, format)?;
        self.bounded(self.records.ensure_exists(id)).await?;

        let stored_name = file_name(filename, format);
        let file_removed = self.store.delete_file(&segments).await?;
        if !file_removed {
            warn!(identifier = %id, filename = %stored_name, "Attachment already absent from storage");
        }

        let link = build_link(self.links.resolve(request_base), id, &stored_name)?;
        let update = match self
            .update_links(id, |current| {
                if link_list::contains(current, &link) {
                    link_list::remove(current, &link)
                } else {
                    current.map(String::from)
                }
            })
            .await
        {
            Ok(update) => update,
            Err(e) => {
                AttachmentStats::inc(&self.stats.link_sync_failures);
                error!(
                    identifier = %id,
                    dangling_link = %link,
                    file_removed,
                    error = %e,
                    "Attachment deleted but its link was not removed"
                );
                return Err(e);
            }
        };

        AttachmentStats::inc(&self.stats.deletions);
        info!(identifier = %id, filename = %stored_name, file_removed, "Deleted attachment");

        Ok(DeletedAttachment {
            filename: stored_name,
            file_removed,
            link_removed: link_list::contains(update.before.as_deref(), &link),
        })
    }

    /// Delete every file of a field and clear its link list.
    pub async fn delete_all(&self, id: &ResourceIdentifier) -> Result<ClearedAttachments> {
        require_field_level(id)?;
        self.bounded(self.records.ensure_exists(id)).await?;

        let directory_removed = self
            .store
            .delete_directory_recursive(&resolve_directory(id))
            .await?;

        let update = match self.update_links(id, |_| None).await {
            Ok(update) => update,
            Err(e) => {
                AttachmentStats::inc(&self.stats.link_sync_failures);
                error!(
                    identifier = %id,
                    error = %e,
                    "Attachment directory deleted but link field not cleared"
                );
                return Err(e);
            }
        };

        AttachmentStats::inc(&self.stats.clears);
        let links_cleared = link_list::parse(update.before.as_deref()).len();
        info!(identifier = %id, directory_removed, links_cleared, "Cleared attachments");

        Ok(ClearedAttachments {
            directory_removed,
            links_cleared,
        })
    }

    /// Files stored for a field and the links its record currently holds.
    pub async fn list(
        &self,
        id: &ResourceIdentifier,
        request_base: &str,
    ) -> Result<AttachmentListing> {
        let (workspace, collection, record_id, field) = field_parts(id)?;
        self.bounded(self.records.ensure_exists(id)).await?;

        let stored = self.store.list(&resolve_directory(id)).await?;
        let record = self
            .bounded(self.records.fetch_one(workspace, collection, record_id))
            .await?;
        let value = self.bounded(self.records.read_field(&record, field)).await?;

        let base = self.links.resolve(request_base);
        let mut files = Vec::with_capacity(stored.len());
        for file in stored {
            let link = build_link(base, id, &file.filename)?;
            files.push(ListedFile {
                linked: link_list::contains(value.as_deref(), &link),
                filename: file.filename,
                media_type: file.media_type,
                size: file.size,
                link,
            });
        }

        let links = link_list::parse(value.as_deref())
            .into_iter()
            .map(String::from)
            .collect();

        Ok(AttachmentListing { files, links })
    }

    /// Read-modify-write of the field's link list under the field lock.
    async fn update_links<F>(&self, id: &ResourceIdentifier, update: F) -> Result<LinkUpdate>
    where
        F: FnOnce(Option<&str>) -> Option<String> + Send,
    {
        let (workspace, collection, record_id, field) = field_parts(id)?;
        let _guard = self.locks.lock(id).await;

        let record = self
            .bounded(self.records.fetch_one(workspace, collection, record_id))
            .await?;
        let before = self.bounded(self.records.read_field(&record, field)).await?;
        let after = update(before.as_deref());
        self.bounded(self.records.write_field(&record, field, after.as_deref()))
            .await?;

        Ok(LinkUpdate { before, after })
    }

    /// Bound one record store round trip by the configured timeout.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.record_timeout, call).await?
    }
}

fn require_field_level(id: &ResourceIdentifier) -> Result<()> {
    field_parts(id).map(|_| ())
}

fn field_parts(id: &ResourceIdentifier) -> Result<(&str, &str, &str, &str)> {
    match (id.collection(), id.record_id(), id.field()) {
        (Some(collection), Some(record_id), Some(field)) => {
            Ok((id.workspace(), collection, record_id, field))
        }
        _ => Err(Error::InvalidIdentifier(format!(
            "operation needs workspace, collection, record id and field: {}",
            id
        ))),
    }
}

fn file_segments(id: &ResourceIdentifier, filename: &str, format: &str) -> Result<Vec<String>> {
    validate_segment("file name", filename)?;
    validate_segment("format", format)?;
    resolve_file(id, Some(filename), Some(format))
        .ok_or_else(|| Error::InvalidInput("file name and format are required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, CreateCollection, CreateRecord};
    use crate::services::records::SqliteRecordStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const BASE: &str = "http://localhost:8080/attachments";

    struct Fixture {
        _tmp: TempDir,
        service: AttachmentService,
        records: SqliteRecordStore,
    }

    async fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let pool = db::init_pool(":memory:").await.unwrap();
        db::initialize_schema(&pool).await.unwrap();
        db::create_workspace(&pool, "ws1").await.unwrap();
        for (name, writable) in [("roads", true), ("archive", false)] {
            db::create_collection(
                &pool,
                CreateCollection {
                    workspace: "ws1".into(),
                    name: name.into(),
                    writable,
                    fields: vec!["photos".into()],
                },
            )
            .await
            .unwrap();
            db::create_record(
                &pool,
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

        let records = SqliteRecordStore::new(pool);
        let service = AttachmentService::new(
            Arc::new(AttachmentStore::new(tmp.path())),
            Arc::new(records.clone()),
            LinkBase::Request,
            UploadPolicy::default(),
            Duration::from_secs(5),
        );
        Fixture {
            _tmp: tmp,
            service,
            records,
        }
    }

    fn photos() -> ResourceIdentifier {
        ResourceIdentifier::for_field("ws1", "roads", "7", "photos").unwrap()
    }

    async fn field_value(f: &Fixture, collection: &str) -> Option<String> {
        let record = f.records.fetch_one("ws1", collection, "7").await.unwrap();
        f.records.read_field(&record, "photos").await.unwrap()
    }

    fn split(filename: &str) -> (&str, &str) {
        filename.split_once('.').unwrap()
    }

    #[test]
    fn test_policy_media_types() {
        let policy = UploadPolicy::default();
        assert!(policy.check_media_type("image/png").is_ok());
        assert!(policy.check_media_type("IMAGE/JPEG").is_ok());
        assert!(matches!(
            policy.check_media_type("text/plain"),
            Err(Error::BadMediaType(_))
        ));
        assert!(matches!(
            policy.check_media_type("not a type"),
            Err(Error::BadMediaType(_))
        ));
        for wildcard in ["image/*", "*/*"] {
            assert!(matches!(
                policy.check_media_type(wildcard),
                Err(Error::BadMediaType(_))
            ));
        }

        let pdf = UploadPolicy {
            allowed_media_types: vec!["application/pdf".into()],
            ..Default::default()
        };
        assert!(pdf.check_media_type("application/pdf").is_ok());
        assert!(pdf.check_media_type("image/png").is_err());
    }

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let f = fixture().await;
        let content = vec![0x89, b'P', b'N', b'G', 1, 2, 3];

        let uploaded = f
            .service
            .upload(&photos(), BASE, "image/png", &content)
            .await
            .unwrap();
        assert!(uploaded.filename.ends_with(".png"));
        assert_eq!(
            uploaded.link,
            format!("{}/ws1/roads/7/photos/{}", BASE, uploaded.filename)
        );

        let (name, format) = split(&uploaded.filename);
        let file = f.service.fetch(&photos(), name, format).await.unwrap();
        assert_eq!(file.data, content);
        assert_eq!(file.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_two_uploads_append_links() {
        let f = fixture().await;

        let a = f.service.upload(&photos(), BASE, "image/jpeg", b"a").await.unwrap();
        assert_eq!(field_value(&f, "roads").await, Some(a.link.clone()));

        let b = f.service.upload(&photos(), BASE, "image/jpeg", b"b").await.unwrap();
        assert_ne!(a.filename, b.filename);
        assert_eq!(
            field_value(&f, "roads").await,
            Some(format!("{},{}", a.link, b.link))
        );

        let listing = f.service.list(&photos(), BASE).await.unwrap();
        assert_eq!(listing.files.len(), 2);
        assert!(listing.files.iter().all(|file| file.linked));
        assert_eq!(listing.links, vec![a.link, b.link]);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_media_type_before_writing() {
        let f = fixture().await;
        let err = f
            .service
            .upload(&photos(), BASE, "text/plain", b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadMediaType(_)));
        assert!(f.service.list(&photos(), BASE).await.unwrap().files.is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_content() {
        let f = fixture().await;
        let service = AttachmentService {
            policy: UploadPolicy {
                max_size: 4,
                ..Default::default()
            },
            ..f.service.clone()
        };
        let err = service
            .upload(&photos(), BASE, "image/png", b"too large")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { max_size: 4 }));
    }

    #[tokio::test]
    async fn test_upload_to_missing_record_is_not_found() {
        let f = fixture().await;
        let id = ResourceIdentifier::for_field("ws1", "roads", "99", "photos").unwrap();
        let err = f.service.upload(&id, BASE, "image/png", b"x").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_to_read_only_collection_leaves_orphan() {
        let f = fixture().await;
        let id = ResourceIdentifier::for_field("ws1", "archive", "7", "photos").unwrap();

        let err = f.service.upload(&id, BASE, "image/png", b"x").await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let stored = f.service.store().list(&resolve_directory(&id)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(f.service.stats().link_sync_failures, 1);
    }

    #[tokio::test]
    async fn test_delete_one_keeps_other_links() {
        let f = fixture().await;
        let a = f.service.upload(&photos(), BASE, "image/png", b"a").await.unwrap();
        let b = f.service.upload(&photos(), BASE, "image/png", b"b").await.unwrap();

        let (name, format) = split(&a.filename);
        let deleted = f
            .service
            .delete_one(&photos(), BASE, name, format)
            .await
            .unwrap();
        assert!(deleted.file_removed);
        assert!(deleted.link_removed);
        assert_eq!(field_value(&f, "roads").await, Some(b.link));

        let err = f.service.fetch(&photos(), name, format).await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_one_removes_link_of_missing_file() {
        let f = fixture().await;
        let a = f.service.upload(&photos(), BASE, "image/png", b"a").await.unwrap();
        let (name, format) = split(&a.filename);

        let mut segments = resolve_directory(&photos());
        segments.push(a.filename.clone());
        f.service.store().delete_file(&segments).await.unwrap();

        let deleted = f
            .service
            .delete_one(&photos(), BASE, name, format)
            .await
            .unwrap();
        assert!(!deleted.file_removed);
        assert!(deleted.link_removed);
        assert_eq!(field_value(&f, "roads").await, None);
    }

    #[tokio::test]
    async fn test_upload_rejects_wildcard_media_type() {
        let f = fixture().await;
        let err = f
            .service
            .upload(&photos(), BASE, "image/*", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadMediaType(_)));
        assert!(f.service.list(&photos(), BASE).await.unwrap().files.is_empty());
        assert_eq!(field_value(&f, "roads").await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_delete_one_of_unlinked_file_leaves_field_untouched() {
        let f = fixture().await;

        let deleted = f
            .service
            .delete_one(&photos(), BASE, "deadbeef", "png")
            .await
            .unwrap();
        assert!(!deleted.file_removed);
        assert!(!deleted.link_removed);
        assert_eq!(field_value(&f, "roads").await.as_deref(), Some(""));

        let kept = f.service.upload(&photos(), BASE, "image/png", b"a").await.unwrap();
        let deleted = f
            .service
            .delete_one(&photos(), BASE, "deadbeef", "png")
            .await
            .unwrap();
        assert!(!deleted.link_removed);
        assert_eq!(field_value(&f, "roads").await, Some(kept.link));
    }

    #[tokio::test]
    async fn test_delete_all_clears_field() {
        let f = fixture().await;
        f.service.upload(&photos(), BASE, "image/png", b"a").await.unwrap();
        f.service.upload(&photos(), BASE, "image/gif", b"b").await.unwrap();

        let cleared = f.service.delete_all(&photos()).await.unwrap();
        assert!(cleared.directory_removed);
        assert_eq!(cleared.links_cleared, 2);
        assert_eq!(field_value(&f, "roads").await, None);

        let dir = f.service.store().path_for(&resolve_directory(&photos()));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_partial_identifier_is_rejected() {
        let f = fixture().await;
        let id = ResourceIdentifier::new("ws1", Some("roads".into()), None, None).unwrap();
        let err = f.service.delete_all(&id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_path_injection() {
        let f = fixture().await;
        let err = f.service.fetch(&photos(), "..", "png").await.unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_proxy_base_is_used_for_links() {
        let f = fixture().await;
        let service = AttachmentService {
            links: LinkBase::Proxy("https://maps.example.org/files/".into()),
            ..f.service.clone()
        };
        let uploaded = service.upload(&photos(), BASE, "image/png", b"a").await.unwrap();
        assert!(uploaded
            .link
            .starts_with("https://maps.example.org/files/ws1/roads/7/photos/"));

        // The same base is needed to match the link on delete.
        let (name, format) = split(&uploaded.filename);
        let deleted = service.delete_one(&photos(), BASE, name, format).await.unwrap();
        assert!(deleted.link_removed);
    }

    struct StalledStore;

    #[async_trait]
    impl RecordLinkStore for StalledStore {
        async fn ensure_exists(&self, _id: &ResourceIdentifier) -> Result<()> {
            std::future::pending().await
        }

        async fn fetch_one(&self, _: &str, _: &str, _: &str) -> Result<db::Record> {
            std::future::pending().await
        }

        async fn read_field(&self, _: &db::Record, _: &str) -> Result<Option<String>> {
            std::future::pending().await
        }

        async fn write_field(&self, _: &db::Record, _: &str, _: Option<&str>) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_slow_record_store_times_out() {
        let tmp = TempDir::new().unwrap();
        let service = AttachmentService::new(
            Arc::new(AttachmentStore::new(tmp.path())),
            Arc::new(StalledStore),
            LinkBase::Request,
            UploadPolicy::default(),
            Duration::from_millis(20),
        );

        let err = service
            .upload(&photos(), BASE, "image/png", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_execute_dispatches_operation() {
        let f = fixture().await;
        let outcome = f
            .service
            .execute(
                &photos(),
                BASE,
                AttachmentOperation::Upload {
                    media_type: "image/png".into(),
                    content: b"png".to_vec(),
                },
            )
            .await
            .unwrap();
        let uploaded = match outcome {
            AttachmentOutcome::Created(uploaded) => uploaded,
            other => panic!("expected Created, got {:?}", other),
        };

        let (name, format) = split(&uploaded.filename);
        let outcome = f
            .service
            .execute(
                &photos(),
                BASE,
                AttachmentOperation::Fetch {
                    filename: name.into(),
                    format: format.into(),
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, AttachmentOutcome::File(file) if file.data == b"png"));
    }
}
