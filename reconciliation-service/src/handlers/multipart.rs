use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use service_core::error::AppError;
use std::collections::HashMap;

pub(crate) struct FilePart {
    pub file_name: String,
    pub bytes: Bytes,
}

/// A fully read multipart form: file parts by field name plus text fields.
#[derive(Default)]
pub(crate) struct Form {
    files: HashMap<String, FilePart>,
    fields: HashMap<String, String>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    form.files.insert(name, FilePart { file_name, bytes });
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn take_file(&mut self, name: &str) -> Result<FilePart, AppError> {
        self.files
            .remove(name)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Missing file field: {}", name)))
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart body: {}", e.body_text()))
    }
}
