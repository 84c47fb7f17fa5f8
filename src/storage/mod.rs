//! Image storage module
//!
//! Handles:
//! - Object upload/delete behind the `ObjectStore` trait (S3 in production)
//! - The image pipeline: resize, key generation, concurrent upload

mod images;
mod media;

pub use images::{ImagePipeline, UploadedImage};
pub use media::S3MediaStorage;

use async_trait::async_trait;

use crate::error::AppError;

/// Blob storage for public images
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object and return its public URL
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        uploaded_by: &str,
    ) -> Result<String, AppError>;

    /// Id of the user who stored the object, `None` if there is no such object
    async fn uploader(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Remove an object
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// HTTPS client shared by the AWS SDK clients (S3, SES)
pub(crate) fn build_aws_http_client() -> aws_sdk_s3::config::SharedHttpClient {
    use aws_smithy_runtime::client::http::hyper_014::HyperClientBuilder;

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_only()
        .enable_http1()
        .enable_http2()
        .build();

    HyperClientBuilder::new().build(https_connector)
}
