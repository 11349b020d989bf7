//! R2 client implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use reelsmith_models::UploadInfo;

use crate::error::{StorageError, StorageResult};
use crate::keys::validate_key;
use crate::MediaUploader;

/// Lifetime of presigned links when no public URL is configured.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public bucket domain; when unset, uploads return presigned URLs
    pub public_url: Option<String>,
    pub presign_expiry: Duration,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_url: std::env::var("R2_PUBLIC_URL").ok().filter(|u| !u.trim().is_empty()),
            presign_expiry: DEFAULT_PRESIGN_EXPIRY,
        })
    }

    /// Whether the R2 variables are present at all.
    pub fn is_configured() -> bool {
        std::env::var("R2_ENDPOINT_URL").is_ok() && std::env::var("R2_BUCKET_NAME").is_ok()
    }

    /// Public URL of `key` under the configured domain.
    pub fn public_url_for(&self, key: &str) -> Option<String> {
        let base = self.public_url.as_deref()?.trim_end_matches('/');
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("{}/{}", base, path))
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    config: R2Config,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            config,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    /// Upload a file to R2.
    pub async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Generate a presigned URL for GET.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Viewer URL for an uploaded object.
    pub async fn object_url(&self, key: &str) -> StorageResult<String> {
        match self.config.public_url_for(key) {
            Some(url) => Ok(url),
            None => self.presign_get(key, self.config.presign_expiry).await,
        }
    }
}

#[async_trait]
impl MediaUploader for R2Client {
    async fn upload_media(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadInfo> {
        self.upload_file(local_path, key, content_type).await?;
        let url = self.object_url(key).await?;
        Ok(UploadInfo {
            key: key.to_string(),
            url,
        })
    }
}
