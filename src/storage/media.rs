//! Image storage on Amazon S3 (or any S3-compatible service)
//!
//! Objects are public and addressed by key; URLs are built from the
//! configured public URL base.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::error::AppError;

const UPLOADED_BY_METADATA: &str = "uploadedBy";

/// S3 object store
pub struct S3MediaStorage {
    /// S3 client
    client: S3Client,
    /// Image bucket name
    bucket: String,
    /// Public URL base
    /// e.g., "https://propnest-media.s3.ap-southeast-2.amazonaws.com"
    public_url: String,
}

impl S3MediaStorage {
    /// Create new media storage client
    ///
    /// Uses the configured endpoint when set (S3-compatible services),
    /// otherwise the regional AWS endpoint.
    pub fn new(config: &StorageConfig) -> Self {
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "propnest-storage",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .http_client(super::build_aws_http_client())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_url: config.public_url_base(),
        }
    }

    /// Get public URL for an S3 key
    pub fn get_public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[async_trait]
impl ObjectStore for S3MediaStorage {
    /// Upload an image
    ///
    /// The uploader's id is kept in the object metadata.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        uploaded_by: &str,
    ) -> Result<String, AppError> {
        use aws_sdk_s3::primitives::ByteStream;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .metadata(UPLOADED_BY_METADATA, uploaded_by)
            .cache_control("public, max-age=31536000") // 1 year
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {}", e)))?;

        Ok(self.get_public_url(key))
    }

    /// Read the uploader back from the object metadata
    ///
    /// S3 lowercases user metadata names, so the lookup ignores case.
    async fn uploader(&self, key: &str) -> Result<Option<String>, AppError> {
        let head = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => head,
            Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => return Ok(None),
            Err(e) => return Err(AppError::Storage(format!("S3 head failed: {}", e))),
        };

        Ok(head.metadata().and_then(|metadata| {
            metadata
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(UPLOADED_BY_METADATA))
                .map(|(_, value)| value.clone())
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed: {}", e)))?;

        Ok(())
    }
}
