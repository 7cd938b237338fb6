use std::path::{Path, PathBuf};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    middleware,
    routing::post,
    Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{authenticate, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::state::AppState;

/// What an upload endpoint accepts.
#[derive(Debug, Clone, Copy)]
pub struct UploadKind {
    pub field: &'static str,
    pub dir: &'static str,
    pub max_files: usize,
    pub content_types: &'static [&'static str],
}

pub const IMAGES: UploadKind = UploadKind {
    field: "images",
    dir: "images",
    max_files: 6,
    content_types: &["image/jpeg", "image/png", "image/webp"],
};

pub const DOCUMENTS: UploadKind = UploadKind {
    field: "documents",
    dir: "documents",
    max_files: 5,
    content_types: &["image/jpeg", "image/png", "image/webp", "application/pdf"],
};

pub fn router(state: AppState) -> Router<AppState> {
    let per_file = state.config.max_upload_bytes;
    let body_limit = per_file * IMAGES.max_files.max(DOCUMENTS.max_files) + 64 * 1024;
    Router::new()
        .route("/images", post(upload_images))
        .route("/documents", post(upload_documents))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
        .layer(DefaultBodyLimit::max(body_limit))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// `5242880` reads as `5 MB`, `1536` as `1.5 KB`.
fn describe_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;
    let (unit, name) = match bytes {
        b if b >= MB => (MB, "MB"),
        b if b >= KB => (KB, "KB"),
        _ => return format!("{} bytes", bytes),
    };
    if bytes % unit == 0 {
        format!("{} {}", bytes / unit, name)
    } else {
        format!("{:.1} {}", bytes as f64 / unit as f64, name)
    }
}

struct Received {
    content_type: String,
    bytes: axum::body::Bytes,
}

/// Reads and checks every file of `kind` before anything touches the disk.
async fn collect(
    multipart: &mut Multipart,
    kind: UploadKind,
    max_bytes: usize,
) -> AppResult<Vec<Received>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(kind.field) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !kind.content_types.contains(&content_type.as_str()) {
            return Err(AppError::bad_request(format!(
                "Unsupported file type {:?}, allowed: {}",
                content_type,
                kind.content_types.join(", ")
            )));
        }
        if files.len() == kind.max_files {
            return Err(AppError::bad_request(format!(
                "At most {} files can be uploaded at once",
                kind.max_files
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Failed to read upload: {}", e)))?;
        if bytes.len() > max_bytes {
            return Err(AppError::bad_request(format!(
                "Each file must be at most {}",
                describe_size(max_bytes)
            )));
        }
        files.push(Received {
            content_type,
            bytes,
        });
    }
    if files.is_empty() {
        return Err(AppError::bad_request(format!(
            "No files found in field {:?}",
            kind.field
        )));
    }
    Ok(files)
}

async fn store_files(
    state: &AppState,
    mut multipart: Multipart,
    kind: UploadKind,
) -> AppResult<Vec<String>> {
    let files = collect(&mut multipart, kind, state.config.max_upload_bytes).await?;

    let dir = PathBuf::from(&state.config.upload_dir).join(kind.dir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create {}: {}", dir.display(), e)))?;

    let named: Vec<(String, axum::body::Bytes)> = files
        .into_iter()
        .map(|f| {
            let name = format!("{}.{}", Uuid::new_v4(), extension_for(&f.content_type));
            (name, f.bytes)
        })
        .collect();
    let names = write_all(&dir, named).await?;
    Ok(names
        .into_iter()
        .map(|name| format!("/uploads/{}/{}", kind.dir, name))
        .collect())
}

/// Writes every file or none: when one write fails the files already written
/// by this call are removed again.
async fn write_all(
    dir: &Path,
    files: Vec<(String, axum::body::Bytes)>,
) -> AppResult<Vec<String>> {
    let mut written: Vec<String> = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let path = dir.join(&name);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            for done in &written {
                let stale = dir.join(done);
                if let Err(e) = tokio::fs::remove_file(&stale).await {
                    log::warn!("Failed to remove partial upload {}: {}", stale.display(), e);
                }
            }
            return Err(AppError::Internal(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }
        written.push(name);
    }
    Ok(written)
}

pub async fn upload_images(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let urls = store_files(&state, multipart, IMAGES).await?;
    log::info!("User {} uploaded {} images", user.id, urls.len());
    Ok(Json(json!({ "success": true, "urls": urls })))
}

pub async fn upload_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let urls = store_files(&state, multipart, DOCUMENTS).await?;
    log::info!("User {} uploaded {} documents", user.id, urls.len());
    Ok(Json(json!({ "success": true, "urls": urls })))
}
