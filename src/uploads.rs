use anyhow::Context;
use axum::extract::multipart::Field;
use bytes::Bytes;
use uuid::Uuid;

use crate::{error::AppError, storage::StorageClient};

pub const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// A file received from a multipart form, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub body: Bytes,
    pub content_type: String,
}

impl Upload {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

pub async fn read_upload(field: Field<'_>, name: &'static str) -> Result<Upload, AppError> {
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let body = field
        .bytes()
        .await
        .map_err(|e| AppError::validation(name, format!("unreadable upload: {e}")))?;
    if body.is_empty() {
        return Err(AppError::validation(name, "uploaded file is empty"));
    }
    Ok(Upload { body, content_type })
}

pub fn require_image(upload: &Upload, name: &'static str) -> Result<(), AppError> {
    if upload.is_image() {
        Ok(())
    } else {
        Err(AppError::validation(
            name,
            format!("expected an image, got {}", upload.content_type),
        ))
    }
}

/// Stores the upload under `{prefix}/{owner}/{random}.{ext}` and returns the key.
pub async fn store_upload(
    storage: &dyn StorageClient,
    prefix: &str,
    owner: Uuid,
    upload: Upload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&upload.content_type).unwrap_or("bin");
    let key = format!("{}/{}/{}.{}", prefix, owner, Uuid::new_v4(), ext);
    storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("store upload {}", key))?;
    Ok(key)
}

pub async fn presign(storage: &dyn StorageClient, key: Option<&str>) -> anyhow::Result<Option<String>> {
    match key {
        Some(k) => Ok(Some(storage.presign_get(k, PRESIGN_TTL_SECS).await?)),
        None => Ok(None),
    }
}

/// Best-effort removal of objects that no longer have an owner row.
pub async fn discard(storage: &dyn StorageClient, keys: impl IntoIterator<Item = String>) {
    for key in keys {
        if let Err(e) = storage.delete_object(&key).await {
            tracing::warn!(error = %e, %key, "failed to delete stored object");
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}
