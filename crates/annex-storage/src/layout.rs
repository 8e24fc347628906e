//! Deterministic mapping from identifiers to storage paths.
//!
//! Layout under the store root:
//! `workspaces/{workspace}/{collection}/attachments/{record_id}/{field}/{name}.{ext}`
//!
//! The path is cut at the deepest level the identifier carries; the
//! `attachments` marker only appears once a collection is present.

use std::path::{Path, PathBuf};

use crate::identifier::ResourceIdentifier;

/// First segment of every resolved path.
pub const ROOT_SEGMENT: &str = "workspaces";

/// Marker segment inserted right after the collection.
pub const ATTACHMENTS_MARKER: &str = "attachments";

/// Directory segments for an identifier, relative to the store root.
pub fn resolve_directory(id: &ResourceIdentifier) -> Vec<String> {
    let mut path = vec![ROOT_SEGMENT.to_string(), id.workspace().to_string()];

    if let Some(collection) = id.collection() {
        path.push(collection.to_string());
        path.push(ATTACHMENTS_MARKER.to_string());
        if let Some(record_id) = id.record_id() {
            path.push(record_id.to_string());
            if let Some(field) = id.field() {
                path.push(field.to_string());
            }
        }
    }

    path
}

/// File segments for an identifier.
///
/// Returns `None` unless both `filename` and `extension` are present and
/// non-empty; callers then fall back to [`resolve_directory`].
pub fn resolve_file(
    id: &ResourceIdentifier,
    filename: Option<&str>,
    extension: Option<&str>,
) -> Option<Vec<String>> {
    match (filename, extension) {
        (Some(name), Some(ext)) if !name.is_empty() && !ext.is_empty() => {
            let mut path = resolve_directory(id);
            path.push(file_name(name, ext));
            Some(path)
        }
        _ => None,
    }
}

/// Join a stem and an extension into a stored file name.
pub fn file_name(stem: &str, extension: &str) -> String {
    format!("{}.{}", stem, extension)
}

/// Join resolved segments onto a root directory.
pub fn to_path(root: &Path, segments: &[String]) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(segments);
    path
}
