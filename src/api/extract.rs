//! Request extractors shared by the handlers

use axum::extract::multipart::Field;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart};

use crate::error::AppError;
use crate::storage::UploadedImage;

/// Largest single file accepted in a multipart body
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// JSON request body
///
/// Like `axum::Json`, but a malformed body is reported as a 400 with the
/// usual `{"error": ...}` shape.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Parse a `:page` path segment; anything unusable means the first page
pub fn page_number(raw: &str) -> u32 {
    raw.trim().parse::<u32>().ok().filter(|page| *page > 0).unwrap_or(1)
}

/// Text parts and file parts of a multipart body, in arrival order
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, UploadedImage)>,
}

impl MultipartForm {
    /// Drain a multipart body
    ///
    /// A part with a file name or an `image/*` content type is treated as a
    /// file; every other part is read as UTF-8 text.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read multipart field: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some()
                || field
                    .content_type()
                    .is_some_and(|content_type| content_type.starts_with("image/"));

            if is_file {
                let bytes = read_limited(field).await?;
                if !bytes.is_empty() {
                    form.files.push((name, UploadedImage { bytes }));
                }
            } else {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read field {}: {}", name, e))
                })?;
                form.fields.push((name, text));
            }
        }

        Ok(form)
    }

    /// Last text value sent under `name`
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Take every file sent under one of `names`
    pub fn take_files(&mut self, names: &[&str]) -> Vec<UploadedImage> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| names.contains(&field.as_str()));
        self.files = rest;
        taken.into_iter().map(|(_, image)| image).collect()
    }

    /// Take the first file sent under `name`
    pub fn take_file(&mut self, name: &str) -> Option<UploadedImage> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }
}

async fn read_limited(mut field: Field<'_>) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?
    {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(format!(
                "File too large. Maximum size is {} bytes",
                MAX_UPLOAD_BYTES
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_default_to_first_page() {
        assert_eq!(page_number("3"), 3);
        assert_eq!(page_number(" 2 "), 2);
        assert_eq!(page_number("0"), 1);
        assert_eq!(page_number("-4"), 1);
        assert_eq!(page_number("abc"), 1);
    }

    #[test]
    fn files_are_taken_by_field_name() {
        let image = |byte| UploadedImage { bytes: vec![byte] };
        let mut form = MultipartForm {
            fields: vec![
                ("name".to_string(), "first".to_string()),
                ("name".to_string(), "second".to_string()),
            ],
            files: vec![
                ("images".to_string(), image(1)),
                ("logo".to_string(), image(2)),
                ("images".to_string(), image(3)),
            ],
        };

        assert_eq!(form.text("name"), Some("second"));
        assert_eq!(form.text("phone"), None);

        let images = form.take_files(&["images"]);
        assert_eq!(
            images.iter().map(|i| i.bytes[0]).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(form.take_file("logo").map(|i| i.bytes), Some(vec![2]));
        assert!(form.take_file("logo").is_none());
    }
}
