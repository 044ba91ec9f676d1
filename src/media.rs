//! Storage for recipe images.
//!
//! Clients upload images inline as `data:image/<ext>;base64,<payload>` URLs.
//! The payload is decoded, size-checked and written below the media root; the
//! database only keeps the relative path (`recipes/images/<uuid>.<ext>`).

use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AppError, AppResult};

const IMAGE_DIR: &str = "recipes/images";
const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpeg", "jpg", "gif", "webp"];

/// A decoded image upload, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Parses a `data:image/<ext>;base64,<payload>` URL.
pub fn decode_data_url(value: &str, max_bytes: usize) -> AppResult<ImageUpload> {
    let rest = value
        .strip_prefix("data:image/")
        .ok_or_else(|| AppError::field("image", "Expected a data:image/<type>;base64,... URL"))?;
    let (mime_subtype, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| AppError::field("image", "Image payload must be base64 encoded"))?;

    let extension = mime_subtype.trim().to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::field("image", format!("Unsupported image type: {}", extension)));
    }

    // Cheap upper bound before decoding: 4 base64 chars carry 3 bytes.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(AppError::field("image", format!("Image exceeds {} bytes", max_bytes)));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::field("image", format!("Invalid base64 payload: {}", e)))?;
    if bytes.is_empty() {
        return Err(AppError::field("image", "Image must not be empty"));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::field("image", format!("Image exceeds {} bytes", max_bytes)));
    }

    Ok(ImageUpload { extension, bytes })
}

/// Persistence seam for uploaded images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores the image and returns its path relative to the media root.
    async fn save(&self, upload: ImageUpload) -> AppResult<String>;
    /// Removes a previously stored image. Missing files are not an error.
    async fn delete(&self, relative_path: &str) -> AppResult<()>;
}

/// Writes images to a directory on the local filesystem.
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> AppResult<PathBuf> {
        // Stored paths are generated by `save`; anything else is refused.
        if relative_path.contains("..") || relative_path.starts_with('/') || relative_path.contains('\\') {
            return Err(AppError::InvalidInput(format!("Invalid media path: {}", relative_path)));
        }
        Ok(self.root.join(relative_path))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, upload: ImageUpload) -> AppResult<String> {
        let relative = format!("{}/{}.{}", IMAGE_DIR, uuid::Uuid::new_v4().simple(), upload.extension);
        let target = self.resolve(&relative)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &upload.bytes).await?;
        tracing::debug!(path = %relative, size = upload.bytes.len(), "Stored recipe image");
        Ok(relative)
    }

    async fn delete(&self, relative_path: &str) -> AppResult<()> {
        let target = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds the public URL of a stored image.
pub fn public_url(url_prefix: &str, relative_path: &str) -> String {
    format!("{}{}", url_prefix, relative_path)
}
