//! API Routes for Annex
//!
//! Thin HTTP front end: each handler turns a request into an
//! `AttachmentOperation` and maps the outcome back to a response.

pub mod attachments;
pub mod status;

use axum::Router;

use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /attachments/* - Attachment upload, download and deletion
/// - /health, /metrics - Health checks (public)
pub fn routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .merge(status::routes())
        .nest(attachments::PREFIX, attachments::routes(max_upload_size))
}
