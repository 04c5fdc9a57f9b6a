//! Image uploads stored on the local filesystem under `upload_dir`.
//!
//! ```text
//! {upload_dir}/
//!   products/product-{id}-{ts}-{n}.{ext}
//!   users/user-{id}-{ts}.{ext}
//! ```
//! Files are served back under `/images`.

use axum::body::Bytes;
use chrono::Utc;
use mime::Mime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;

pub const NOT_AN_IMAGE: &str = "Not an image! Please upload only images.";

/// One uploaded file part.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    /// File extension for an accepted image type, `NOT_AN_IMAGE` otherwise.
    pub fn extension(&self) -> Result<&'static str, ServiceError> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.parse::<Mime>().ok())
            .filter(|parsed| parsed.type_() == mime::IMAGE)
            .and_then(|parsed| image_extension(parsed.subtype().as_str()))
            .ok_or_else(|| ServiceError::BadRequest(NOT_AN_IMAGE.to_string()))
    }
}

fn image_extension(subtype: &str) -> Option<&'static str> {
    match subtype {
        "png" => Some("png"),
        "jpeg" | "jpg" | "pjpeg" => Some("jpeg"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        "avif" => Some("avif"),
        "bmp" => Some("bmp"),
        "tiff" => Some("tiff"),
        _ => None,
    }
}

pub fn product_file_name(product_id: Uuid, timestamp: i64, index: usize, ext: &str) -> String {
    format!("product-{}-{}-{}.{}", product_id, timestamp, index, ext)
}

pub fn user_file_name(user_id: Uuid, timestamp: i64, ext: &str) -> String {
    format!("user-{}-{}.{}", user_id, timestamp, ext)
}

#[derive(Debug, Clone)]
pub struct UploadService {
    root: PathBuf,
}

/// Names assigned to a product upload: cover first, then gallery images.
#[derive(Debug, Default)]
pub struct StoredProductImages {
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
}

impl UploadService {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write(&self, dir: &str, name: &str, bytes: &[u8]) -> Result<(), ServiceError> {
        let dir = self.root.join(dir);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(name);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &path).await?;
        debug!(path = %path.display(), size = bytes.len(), "Stored upload");
        Ok(())
    }

    /// Validates every part first so a bad part writes nothing.
    pub async fn store_product_images(
        &self,
        product_id: Uuid,
        cover: Option<ImageUpload>,
        images: Vec<ImageUpload>,
    ) -> Result<StoredProductImages, ServiceError> {
        let cover_ext = cover.as_ref().map(ImageUpload::extension).transpose()?;
        let image_exts = images
            .iter()
            .map(ImageUpload::extension)
            .collect::<Result<Vec<_>, _>>()?;

        let timestamp = Utc::now().timestamp_millis();
        let mut stored = StoredProductImages::default();

        if let (Some(cover), Some(ext)) = (cover, cover_ext) {
            let name = product_file_name(product_id, timestamp, 0, ext);
            self.write("products", &name, &cover.bytes).await?;
            stored.image_cover = Some(name);
        }

        if !images.is_empty() {
            let mut names = Vec::with_capacity(images.len());
            for (i, (image, ext)) in images.iter().zip(image_exts).enumerate() {
                let name = product_file_name(product_id, timestamp, i + 1, ext);
                self.write("products", &name, &image.bytes).await?;
                names.push(name);
            }
            stored.images = Some(names);
        }

        Ok(stored)
    }

    pub async fn store_user_photo(
        &self,
        user_id: Uuid,
        photo: ImageUpload,
    ) -> Result<String, ServiceError> {
        let ext = photo.extension()?;
        let name = user_file_name(user_id, Utc::now().timestamp_millis(), ext);
        self.write("users", &name, &photo.bytes).await?;
        Ok(name)
    }
}
