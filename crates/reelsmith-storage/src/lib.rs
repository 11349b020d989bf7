//! Cloudflare R2 storage for finished renders.
//!
//! This crate provides:
//! - The `MediaUploader` seam used by compose-and-upload
//! - An R2 implementation returning public or presigned URLs
//! - The object key layout for compositions

pub mod client;
pub mod error;
pub mod keys;

use std::path::Path;

use async_trait::async_trait;

use reelsmith_models::UploadInfo;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::composition_key;

/// Content type of rendered compositions.
pub const VIDEO_MP4: &str = "video/mp4";

/// Publishes local media to object storage.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload_media(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadInfo>;
}
