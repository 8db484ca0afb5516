use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::client::StorageClient;

/// Storage key prefix for uploaded files.
const UPLOAD_PREFIX: &str = "files";

/// File types accepted for bills and faculty photographs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Jpeg,
    Png,
}

impl UploadKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(UploadKind::Pdf),
            "image/jpeg" | "image/jpg" => Some(UploadKind::Jpeg),
            "image/png" => Some(UploadKind::Png),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(UploadKind::Pdf),
            "jpg" | "jpeg" => Some(UploadKind::Jpeg),
            "png" => Some(UploadKind::Png),
            _ => None,
        }
    }

    /// Does `data` start with this type's file signature?
    pub fn matches_signature(&self, data: &[u8]) -> bool {
        match self {
            UploadKind::Pdf => data.starts_with(b"%PDF-"),
            UploadKind::Jpeg => data.starts_with(&[0xFF, 0xD8, 0xFF]),
            UploadKind::Png => data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            UploadKind::Pdf => "pdf",
            UploadKind::Jpeg => "jpg",
            UploadKind::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            UploadKind::Pdf => "application/pdf",
            UploadKind::Jpeg => "image/jpeg",
            UploadKind::Png => "image/png",
        }
    }
}

/// Response from a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Generated file name; store this on the record referencing the file.
    pub name: String,
    /// The URL path where the file can be fetched.
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

/// Validate and store one uploaded file under a generated name.
///
/// The declared content type must be PDF, JPEG or PNG and agree with the
/// file signature; the size must be strictly below `max_bytes`.
pub async fn process_upload(
    storage: &dyn StorageClient,
    max_bytes: usize,
    original_name: &str,
    content_type: &str,
    data: Vec<u8>,
) -> Result<UploadResponse, AppError> {
    let kind = UploadKind::from_content_type(content_type).ok_or_else(|| {
        AppError::BadRequest("Only PDF, JPEG and PNG files are allowed".into())
    })?;

    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    if data.len() >= max_bytes {
        return Err(AppError::BadRequest(format!(
            "File must be smaller than {} bytes",
            max_bytes
        )));
    }
    if !kind.matches_signature(&data) {
        return Err(AppError::BadRequest(format!(
            "File content does not match declared type {}",
            kind.content_type()
        )));
    }

    let name = format!("{}.{}", uuid::Uuid::new_v4(), kind.extension());
    let size = data.len();
    storage
        .put_object(&format!("{UPLOAD_PREFIX}/{name}"), data)
        .await?;

    tracing::info!(original_name, stored_as = %name, size, "File uploaded");

    Ok(UploadResponse {
        url: format!("/api/uploads/{name}"),
        content_type: kind.content_type().to_string(),
        name,
        size,
    })
}

/// `POST /api/uploads`
///
/// Accepts a multipart form with a single file field named "file".
pub async fn upload_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        let response = process_upload(
            state.storage_client.as_ref(),
            state.config.uploads.max_bytes,
            &file_name,
            &content_type,
            data.to_vec(),
        )
        .await?;
        return Ok(Json(response));
    }

    Err(AppError::BadRequest("No file field found in request".into()))
}

/// `GET /api/uploads/{name}`
pub async fn serve_upload_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let kind = UploadKind::from_file_name(&name)
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let data = state
        .storage_client
        .get_object(&format!("{UPLOAD_PREFIX}/{name}"))
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    Ok(([(header::CONTENT_TYPE, kind.content_type())], data).into_response())
}
