//! Attachments Routes
//!
//! File attachments of one record field, kept in sync with the field's
//! comma-separated link list.
//!
//! Storage Structure:
//! `{attachments_path}/workspaces/{workspace}/{collection}/attachments/{record_id}/{field}/{token}.{ext}`
//!
//! Routes:
//! - GET /attachments/:workspace/:collection/:record_id/:field - List attachments
//! - POST|PUT /attachments/:workspace/:collection/:record_id/:field - Upload (raw body)
//! - DELETE /attachments/:workspace/:collection/:record_id/:field - Delete all attachments
//! - GET /attachments/:workspace/:collection/:record_id/:field/:file - Download attachment
//! - DELETE /attachments/:workspace/:collection/:record_id/:field/:file - Delete attachment

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use annex_storage::ResourceIdentifier;

use crate::services::{
    AttachmentListing, AttachmentOperation, AttachmentOutcome, ClearedAttachments,
    DeletedAttachment, UploadedAttachment,
};
use crate::{AppState, Error, Result};

/// Path prefix the attachment routes are nested under.
pub const PREFIX: &str = "/attachments";

/// Seconds clients may cache a downloaded attachment.
const CACHE_MAX_AGE: u32 = 300;

/// Build attachment routes. Upload bodies above `max_body` bytes are refused.
pub fn routes(max_body: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/:workspace/:collection/:record_id/:field",
            get(list_attachments)
                .post(upload_attachment)
                .put(upload_attachment)
                .delete(delete_all_attachments),
        )
        .route(
            "/:workspace/:collection/:record_id/:field/:file",
            get(download_attachment).delete(delete_attachment),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub attachment: UploadedAttachment,
    pub message: String,
}

/// List attachments response.
#[derive(Debug, Serialize)]
pub struct ListAttachmentsResponse {
    #[serde(flatten)]
    pub listing: AttachmentListing,
    pub total: u32,
}

/// Delete attachment response.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    #[serde(flatten)]
    pub result: DeletedAttachment,
    pub message: String,
}

/// Delete all attachments response.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    #[serde(flatten)]
    pub result: ClearedAttachments,
    pub message: String,
}

// ============================================================================
// Path Extractors
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FieldPath {
    pub workspace: String,
    pub collection: String,
    pub record_id: String,
    pub field: String,
}

impl FieldPath {
    fn identifier(&self) -> Result<ResourceIdentifier> {
        Ok(ResourceIdentifier::for_field(
            &self.workspace,
            &self.collection,
            &self.record_id,
            &self.field,
        )?)
    }
}

#[derive(Debug, Deserialize)]
pub struct FilePath {
    pub workspace: String,
    pub collection: String,
    pub record_id: String,
    pub field: String,
    pub file: String,
}

impl FilePath {
    fn identifier(&self) -> Result<ResourceIdentifier> {
        Ok(ResourceIdentifier::for_field(
            &self.workspace,
            &self.collection,
            &self.record_id,
            &self.field,
        )?)
    }

    /// Split `<name>.<format>` at the first dot.
    fn name_and_format(&self) -> Result<(String, String)> {
        match self.file.split_once('.') {
            Some((name, format)) if !name.is_empty() && !format.is_empty() => {
                Ok((name.to_string(), format.to_string()))
            }
            _ => Err(Error::InvalidInput(format!(
                "expected <name>.<format>, got {}",
                self.file
            ))),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// List attachments of a field.
///
/// GET /attachments/:workspace/:collection/:record_id/:field
#[axum::debug_handler]
async fn list_attachments(
    State(state): State<AppState>,
    Path(path): Path<FieldPath>,
    headers: HeaderMap,
) -> Result<Json<ListAttachmentsResponse>> {
    let id = path.identifier()?;
    let base = request_base(&headers);

    match state
        .attachments
        .execute(&id, &base, AttachmentOperation::List)
        .await?
    {
        AttachmentOutcome::Listing(listing) => {
            let total = listing.files.len() as u32;
            Ok(Json(ListAttachmentsResponse { listing, total }))
        }
        other => Err(unexpected("list", &other)),
    }
}

/// Upload an attachment to a field.
///
/// POST|PUT /attachments/:workspace/:collection/:record_id/:field
///
/// The body is the raw file; its media type comes from `Content-Type`.
/// The stored name is generated, so the client filename never matters.
#[axum::debug_handler]
async fn upload_attachment(
    State(state): State<AppState>,
    Path(path): Path<FieldPath>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let id = path.identifier()?;
    let base = request_base(&headers);

    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::BadMediaType("missing Content-Type".into()))?
        .to_string();

    let operation = AttachmentOperation::Upload {
        media_type,
        content: body.to_vec(),
    };

    match state.attachments.execute(&id, &base, operation).await? {
        AttachmentOutcome::Created(attachment) => {
            let location = attachment.link.clone();
            let response = UploadResponse {
                attachment,
                message: "File uploaded successfully".into(),
            };
            Ok((
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(response),
            )
                .into_response())
        }
        other => Err(unexpected("upload", &other)),
    }
}

/// Download an attachment.
///
/// GET /attachments/:workspace/:collection/:record_id/:field/:file
#[axum::debug_handler]
async fn download_attachment(
    State(state): State<AppState>,
    Path(path): Path<FilePath>,
    headers: HeaderMap,
) -> Result<Response> {
    let id = path.identifier()?;
    let (filename, format) = path.name_and_format()?;
    let base = request_base(&headers);

    let file = match state
        .attachments
        .execute(&id, &base, AttachmentOperation::Fetch { filename, format })
        .await?
    {
        AttachmentOutcome::File(file) => file,
        other => return Err(unexpected("fetch", &other)),
    };

    let response = Response::builder()
        .header(header::CONTENT_TYPE, &file.media_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", file.filename),
        )
        .header(header::CONTENT_LENGTH, file.data.len())
        .header(header::CACHE_CONTROL, format!("max-age={}", CACHE_MAX_AGE))
        .body(Body::from(file.data))
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Delete an attachment and remove its link.
///
/// DELETE /attachments/:workspace/:collection/:record_id/:field/:file
#[axum::debug_handler]
async fn delete_attachment(
    State(state): State<AppState>,
    Path(path): Path<FilePath>,
    headers: HeaderMap,
) -> Result<Json<DeleteResponse>> {
    let id = path.identifier()?;
    let (filename, format) = path.name_and_format()?;
    let base = request_base(&headers);

    match state
        .attachments
        .execute(&id, &base, AttachmentOperation::DeleteOne { filename, format })
        .await?
    {
        AttachmentOutcome::Deleted(result) => {
            let message = if result.file_removed {
                "Attachment deleted successfully"
            } else {
                "Attachment was not stored; link list updated"
            };
            Ok(Json(DeleteResponse {
                result,
                message: message.into(),
            }))
        }
        other => Err(unexpected("delete", &other)),
    }
}

/// Delete every attachment of a field and clear its link list.
///
/// DELETE /attachments/:workspace/:collection/:record_id/:field
#[axum::debug_handler]
async fn delete_all_attachments(
    State(state): State<AppState>,
    Path(path): Path<FieldPath>,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>> {
    let id = path.identifier()?;
    let base = request_base(&headers);

    match state
        .attachments
        .execute(&id, &base, AttachmentOperation::DeleteAll)
        .await?
    {
        AttachmentOutcome::Cleared(result) => Ok(Json(ClearResponse {
            result,
            message: "Attachments deleted successfully".into(),
        })),
        other => Err(unexpected("delete all", &other)),
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Base URL of the attachment routes as seen by the client.
///
/// Uses `X-Forwarded-Proto` (default `http`) and `Host`; without a `Host`
/// header the configured public URL is used.
fn request_base(headers: &HeaderMap) -> String {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

    match host {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("http");
            format!("{}://{}{}", scheme, host, PREFIX)
        }
        None => format!(
            "{}{}",
            crate::config().server.public_url.trim_end_matches('/'),
            PREFIX
        ),
    }
}

fn unexpected(operation: &str, outcome: &AttachmentOutcome) -> Error {
    Error::Internal(format!(
        "{} produced an unexpected outcome: {:?}",
        operation, outcome
    ))
}
