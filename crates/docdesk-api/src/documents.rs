use std::path::{Path as FsPath, PathBuf};

use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::Field},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use docdesk_db::models::NewDocument;
use docdesk_types::api::{
    ApiResponse, DocumentData, DocumentsData, UserDocumentsData, UserDocumentsRequest,
};

use crate::access::{Caller, check_document};
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};
use crate::storage::Storage;
use crate::{validate, views};

const UPLOAD_FIELD: &str = "document";
const FALLBACK_FILENAME: &str = "document";
const FALLBACK_MIME: &str = "application/octet-stream";
const MAX_FILENAME_CHARS: usize = 255;

/// POST /api/documents/upload, multipart field `document`.
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(mut multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) || field.file_name().is_none() {
            continue;
        }
        return store_upload(&state, &caller, &mut field).await;
    }
    Err(ApiError::BadRequest("No file uploaded".into()))
}

async fn store_upload(
    state: &AppState,
    caller: &Caller,
    field: &mut Field<'_>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentData>>), ApiError> {
    let original = sanitize_filename(field.file_name().unwrap_or(FALLBACK_FILENAME));
    let mime_type = field
        .content_type()
        .filter(|ct| HeaderValue::from_str(ct).is_ok())
        .unwrap_or(FALLBACK_MIME)
        .to_string();

    let stored = Storage::stored_name(&original);
    let path = state.storage.file_path(&stored);

    let size = match write_field(field, &path, state.settings.max_upload_bytes).await {
        Ok(0) => {
            discard_partial(&state.storage, &path).await;
            return Err(ApiError::BadRequest("Uploaded file is empty".into()));
        }
        Ok(size) => size,
        Err(e) => {
            discard_partial(&state.storage, &path).await;
            return Err(e);
        }
    };

    let owner_id = caller.id;
    let filepath = path.display().to_string();
    let (name, mime) = (original.clone(), mime_type);
    let record = run_blocking(state, "Upload failed", move |db| {
        let id = db.insert_document(&NewDocument {
            user_id: owner_id,
            filename: &stored,
            original_filename: &name,
            filepath: &filepath,
            file_size: i64::try_from(size)?,
            mime_type: &mime,
        })?;
        db.get_document(id)?
            .ok_or_else(|| anyhow::anyhow!("document {id} vanished after insert"))
    })
    .await;

    let row = match record {
        Ok(row) => row,
        Err(e) => {
            discard_partial(&state.storage, &path).await;
            return Err(e);
        }
    };

    info!(
        "User {} uploaded document {} ({}, {} bytes)",
        caller.id, row.id, original, size
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Document uploaded successfully",
            DocumentData {
                document: views::document(row, false),
            },
        )),
    ))
}

/// Streams one multipart field to `path`, enforcing `max_bytes` as it goes.
async fn write_field(field: &mut Field<'_>, path: &FsPath, max_bytes: u64) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(ApiError::internal("Upload failed"))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(ApiError::InvalidInput {
                message: "File upload error",
                detail: format!("File exceeds the {} byte limit", max_bytes),
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(ApiError::internal("Upload failed"))?;
    }

    file.flush().await.map_err(ApiError::internal("Upload failed"))?;
    Ok(written)
}

async fn discard_partial(storage: &Storage, path: &FsPath) {
    if let Err(e) = storage.delete_file(path).await {
        warn!("Failed to remove partial upload {}: {}", path.display(), e);
    }
}

pub async fn my_documents(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, "Failed to load documents", move |db| {
        db.list_documents(Some(caller.id))
    })
    .await?;

    Ok(Json(ApiResponse::data(DocumentsData {
        documents: rows.into_iter().map(|r| views::document(r, false)).collect(),
    })))
}

pub async fn download_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(document_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = run_blocking(&state, "Download failed", move |db| db.get_document(document_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    check_document(&caller, &doc)?;

    let path = PathBuf::from(&doc.filepath);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Document {} is missing its file {}", doc.id, path.display());
            return Err(ApiError::NotFound("File not found on server".into()));
        }
        Err(e) => return Err(ApiError::internal("Download failed")(e)),
    };
    let length = file
        .metadata()
        .await
        .map_err(ApiError::internal("Download failed"))?
        .len();

    let content_type = HeaderValue::from_str(&doc.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_MIME));
    let disposition = HeaderValue::from_str(&content_disposition(&doc.original_filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    info!("User {} downloading document {}", caller.id, doc.id);

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    WithRejection(Path(document_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = run_blocking(&state, "Delete failed", move |db| db.get_document(document_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".into()))?;
    check_document(&caller, &doc)?;

    if let Err(e) = state.storage.delete_file(FsPath::new(&doc.filepath)).await {
        warn!("Failed to unlink {} for document {}: {}", doc.filepath, doc.id, e);
    }

    run_blocking(&state, "Delete failed", move |db| db.delete_document(document_id)).await?;
    info!("User {} deleted document {}", caller.id, document_id);

    Ok(Json(ApiResponse::<()>::message("Document deleted successfully")))
}

pub async fn all_documents(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_blocking(&state, "Failed to load documents", |db| db.list_documents(None)).await?;

    Ok(Json(ApiResponse::data(DocumentsData {
        documents: rows.into_iter().map(|r| views::document(r, true)).collect(),
    })))
}

/// Admin lookup by `userId` first, then `email`.
pub async fn user_documents(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<UserDocumentsRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req
        .email
        .as_deref()
        .map(validate::normalize_email)
        .filter(|e| !e.is_empty());

    let user = match (req.user_id, email) {
        (Some(id), _) => {
            run_blocking(&state, "Failed to load documents", move |db| db.get_user_by_id(id)).await?
        }
        (None, Some(email)) => {
            run_blocking(&state, "Failed to load documents", move |db| {
                db.get_user_by_email(&email)
            })
            .await?
        }
        (None, None) => {
            return Err(ApiError::BadRequest("User ID or email is required".into()));
        }
    }
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let owner_id = user.id;
    let rows = run_blocking(&state, "Failed to load documents", move |db| {
        db.list_documents(Some(owner_id))
    })
    .await?;

    Ok(Json(ApiResponse::data(UserDocumentsData {
        user: views::owner_summary(user.id, &user.name, &user.email),
        documents: rows.into_iter().map(|r| views::document(r, true)).collect(),
    })))
}

/// Drops any directory part a browser may send and strips control
/// characters. Falls back to a generic name when nothing is left.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `attachment; filename="…"` with an ASCII fallback, plus an RFC 5987
/// `filename*` when the name is not plain ASCII.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if filename.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode(filename)
        )
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
