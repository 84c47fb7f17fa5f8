//! Image pipeline
//!
//! Scales oversized uploads down to fit a bounding box, keeps the original
//! encoding, and stores every image of a request concurrently. The request
//! fails as a whole if any single image fails.

use std::io::Cursor;
use std::sync::Arc;

use image::{GenericImageView, ImageFormat};

use super::ObjectStore;
use crate::data::Photo;
use crate::error::AppError;
use crate::metrics::{IMAGE_BYTES_UPLOADED, IMAGES_UPLOADED_TOTAL};

/// Raw image received from a client
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
}

/// Image ready for upload
#[derive(Debug)]
struct PreparedImage {
    bytes: Vec<u8>,
    extension: &'static str,
    content_type: &'static str,
}

/// Resize + store images
pub struct ImagePipeline {
    store: Arc<dyn ObjectStore>,
    max_width: u32,
    max_height: u32,
}

impl ImagePipeline {
    pub fn new(store: Arc<dyn ObjectStore>, max_width: u32, max_height: u32) -> Self {
        Self {
            store,
            max_width,
            max_height,
        }
    }

    /// Store all images for one uploader
    ///
    /// # Returns
    /// Photo records in the same order as the input
    pub async fn store(
        &self,
        images: Vec<UploadedImage>,
        uploaded_by: &str,
    ) -> Result<Vec<Photo>, AppError> {
        let uploads = images
            .into_iter()
            .map(|image| self.store_one(image, uploaded_by));

        futures::future::try_join_all(uploads).await
    }

    async fn store_one(&self, image: UploadedImage, uploaded_by: &str) -> Result<Photo, AppError> {
        let (max_width, max_height) = (self.max_width, self.max_height);
        let prepared =
            tokio::task::spawn_blocking(move || prepare_image(image.bytes, max_width, max_height))
                .await
                .map_err(|e| AppError::Internal(e.into()))??;

        let key = format!(
            "{}.{}",
            ulid::Ulid::new().to_string().to_lowercase(),
            prepared.extension
        );
        let size = prepared.bytes.len();
        let url = self
            .store
            .put(&key, prepared.bytes, prepared.content_type, uploaded_by)
            .await?;

        IMAGES_UPLOADED_TOTAL.inc();
        IMAGE_BYTES_UPLOADED.inc_by(size as f64);
        tracing::debug!(key = %key, size, "Image stored");

        Ok(Photo {
            url,
            key,
            uploaded_by: uploaded_by.to_string(),
        })
    }

    /// Who stored the image, as recorded by the store at upload time
    pub async fn uploader(&self, key: &str) -> Result<Option<String>, AppError> {
        self.store.uploader(key).await
    }

    /// Remove a stored image
    ///
    /// Callers check that the requester is the uploader.
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.store.delete(key).await
    }
}

/// Decode, shrink to fit if needed, and re-encode in the original format
fn prepare_image(
    bytes: Vec<u8>,
    max_width: u32,
    max_height: u32,
) -> Result<PreparedImage, AppError> {
    let format = image::guess_format(&bytes)
        .map_err(|_| AppError::Validation("Unsupported image format".to_string()))?;
    let (extension, content_type) = match format {
        ImageFormat::Jpeg => ("jpg", "image/jpeg"),
        ImageFormat::Png => ("png", "image/png"),
        ImageFormat::WebP => ("webp", "image/webp"),
        ImageFormat::Gif => ("gif", "image/gif"),
        _ => return Err(AppError::Validation("Unsupported image format".to_string())),
    };

    let img = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| AppError::Validation(format!("Invalid image: {}", e)))?;

    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return Ok(PreparedImage {
            bytes,
            extension,
            content_type,
        });
    }

    // Keeps aspect ratio, fits inside the box
    let resized = img.resize(max_width, max_height, image::imageops::FilterType::Lanczos3);
    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, format)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode image: {}", e)))?;

    Ok(PreparedImage {
        bytes: out.into_inner(),
        extension,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectStore;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn oversized_image_is_scaled_into_the_box() {
        let prepared = prepare_image(png(3200, 900), 1600, 900).unwrap();
        assert_eq!(prepared.content_type, "image/png");

        let img = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(img.dimensions(), (1600, 450));
    }

    #[test]
    fn small_image_is_left_untouched() {
        let original = png(400, 300);
        let prepared = prepare_image(original.clone(), 1600, 900).unwrap();
        assert_eq!(prepared.bytes, original);
        assert_eq!(prepared.extension, "png");
    }

    #[test]
    fn garbage_is_rejected_as_validation_error() {
        let error = prepare_image(b"not an image".to_vec(), 1600, 900).unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn store_returns_records_for_every_image() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .times(2)
            .withf(|key, _, content_type, uploaded_by| {
                key.ends_with(".png")
                    && content_type.to_string() == "image/png"
                    && uploaded_by.to_string() == "user-1"
            })
            .returning(|key, _, _, _| Ok(format!("https://media.test/{key}")));

        let pipeline = ImagePipeline::new(Arc::new(store), 1600, 900);
        let photos = pipeline
            .store(
                vec![
                    UploadedImage { bytes: png(10, 10) },
                    UploadedImage { bytes: png(20, 20) },
                ],
                "user-1",
            )
            .await
            .unwrap();

        assert_eq!(photos.len(), 2);
        assert_ne!(photos[0].key, photos[1].key);
        assert!(photos.iter().all(|photo| photo.url.ends_with(&photo.key)));
        assert!(photos.iter().all(|photo| photo.uploaded_by == "user-1"));
    }

    #[tokio::test]
    async fn one_failed_upload_fails_the_batch() {
        let mut store = MockObjectStore::new();
        store
            .expect_put()
            .returning(|_, data, _, _| {
                if data.len() > 100 {
                    Err(AppError::Storage("put failed".to_string()))
                } else {
                    Ok("https://media.test/ok".to_string())
                }
            });

        let pipeline = ImagePipeline::new(Arc::new(store), 1600, 900);
        let result = pipeline
            .store(
                vec![
                    UploadedImage { bytes: png(1, 1) },
                    UploadedImage {
                        bytes: png(400, 400),
                    },
                ],
                "user-1",
            )
            .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}
