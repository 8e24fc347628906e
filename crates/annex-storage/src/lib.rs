//! Filesystem storage for record-field attachments.
//!
//! Files live under a single root in a directory tree derived from the
//! resource identifier:
//!
//! ```text
//! {root}/workspaces/{workspace}/{collection}/attachments/{record_id}/{field}/{token}.{ext}
//! ```
//!
//! This crate knows nothing about record stores or links; it only maps
//! identifiers to paths and performs the file operations.

mod error;
pub mod identifier;
pub mod layout;
pub mod store;

pub use error::{Error, Result};
pub use identifier::ResourceIdentifier;
pub use layout::{resolve_directory, resolve_file};
pub use mime_guess::Mime;
pub use store::{AttachmentStore, StoredFile};
