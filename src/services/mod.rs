//! Service layer for Annex.
//!
//! Contains the attachment synchronization logic:
//! - Attachments (upload/fetch/delete/list orchestration)
//! - Records (record store contract and its SQLite implementation)
//! - LinkList (comma-separated link list codec)
//! - Links (link construction and base URL selection)
//! - Locks (per-field serialization of link list updates)

mod attachments;
pub mod link_list;
pub mod links;
mod locks;
mod records;

pub use attachments::{
    AttachmentFile, AttachmentListing, AttachmentOperation, AttachmentOutcome, AttachmentService,
    AttachmentStats, ClearedAttachments, DeletedAttachment, ListedFile, StatsSnapshot,
    UploadPolicy, UploadedAttachment,
};
pub use links::LinkBase;
pub use locks::{FieldGuard, FieldLocks};
pub use records::{RecordLinkStore, SqliteRecordStore};
