//! Multipart form reading with per-route size and type limits.

use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use tracing::debug;

use crate::error::{AppError, Result};

pub const DETECTION_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/bmp"];
pub const AVATAR_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// What a file part must look like to be accepted.
#[derive(Debug, Clone, Copy)]
pub enum Accept {
    /// One of these content types.
    Mime(&'static [&'static str]),
    /// A file name with this extension, including the dot.
    Extension(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct UploadRule {
    /// Name of the single file field.
    pub field: &'static str,
    pub max_bytes: usize,
    pub accept: Accept,
}

impl UploadRule {
    fn check_type(&self, file_name: &str, content_type: &str) -> Result<()> {
        match self.accept {
            Accept::Mime(types) => {
                if types.contains(&content_type) {
                    return Ok(());
                }
                let names: Vec<String> = types
                    .iter()
                    .filter_map(|t| t.split('/').nth(1))
                    .map(|t| t.to_uppercase())
                    .collect();
                Err(AppError::UnsupportedMediaType(format!(
                    "Only {} images are allowed",
                    names.join(", ")
                )))
            }
            Accept::Extension(ext) => {
                if file_name.to_ascii_lowercase().ends_with(ext) {
                    return Ok(());
                }
                Err(AppError::UnsupportedMediaType(format!(
                    "Only {} files are allowed",
                    ext.trim_start_matches('.').to_uppercase()
                )))
            }
        }
    }

    fn too_large(&self) -> AppError {
        AppError::PayloadTooLarge(format!(
            "File exceeds the {}MB limit",
            (self.max_bytes as f64 / 1024.0 / 1024.0).round()
        ))
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Text fields plus the file part, if one was sent.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Trimmed, non-empty text field.
    pub fn required_text(&self, name: &str) -> Option<&str> {
        self.text(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, missing: &str) -> Result<UploadedFile> {
        self.file
            .take()
            .ok_or_else(|| AppError::BadRequest(missing.to_string()))
    }
}

/// Read every part of the form. Only `rule.field` may carry a file.
pub async fn read_form(mut multipart: Multipart, rule: &UploadRule) -> Result<MultipartForm> {
    let mut form = MultipartForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| form_error(e, rule))? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        let Some(file_name) = file_name else {
            let value = field.text().await.map_err(|e| form_error(e, rule))?;
            form.fields.insert(name, value);
            continue;
        };

        if name != rule.field {
            return Err(AppError::BadRequest(format!("Unexpected file field '{}'", name)));
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_ascii_lowercase();
        rule.check_type(&file_name, &content_type)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| form_error(e, rule))? {
            if bytes.len() + chunk.len() > rule.max_bytes {
                return Err(rule.too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        debug!("Received {} ({}, {} bytes)", file_name, content_type, bytes.len());

        form.file = Some(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }

    Ok(form)
}

fn form_error(err: MultipartError, rule: &UploadRule) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return rule.too_large();
    }
    AppError::BadRequest(format!("Invalid multipart form: {}", err.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header::CONTENT_TYPE, Request},
    };

    const BOUNDARY: &str = "pcbBoundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str, &'a [u8]),
    }

    async fn multipart(parts: &[Part<'_>]) -> Multipart {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, mime, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    const IMAGE_RULE: UploadRule = UploadRule {
        field: "image",
        max_bytes: 16,
        accept: Accept::Mime(DETECTION_IMAGE_TYPES),
    };

    #[tokio::test]
    async fn test_reads_fields_and_file() {
        let mp = multipart(&[
            Part::Text("confidenceThreshold", "0.4"),
            Part::File("image", "board.png", "image/png", b"pngbytes"),
        ])
        .await;

        let mut form = read_form(mp, &IMAGE_RULE).await.unwrap();
        assert_eq!(form.text("confidenceThreshold"), Some("0.4"));
        let file = form.take_file("missing").unwrap();
        assert_eq!(file.file_name, "board.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.bytes, b"pngbytes");
    }

    #[tokio::test]
    async fn test_rejects_wrong_type() {
        let mp = multipart(&[Part::File("image", "board.gif", "image/gif", b"gif")]).await;
        let err = read_form(mp, &IMAGE_RULE).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.to_string(), "Only JPEG, JPG, PNG, BMP images are allowed");
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let mp = multipart(&[Part::File("image", "big.png", "image/png", &[0u8; 32])]).await;
        let err = read_form(mp, &IMAGE_RULE).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let mp = multipart(&[Part::Text("confidenceThreshold", "0.4")]).await;
        let mut form = read_form(mp, &IMAGE_RULE).await.unwrap();
        let err = form.take_file("Please upload an image").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unexpected_file_field() {
        let mp = multipart(&[Part::File("other", "a.png", "image/png", b"x")]).await;
        let err = read_form(mp, &IMAGE_RULE).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_extension_rule() {
        let rule = UploadRule {
            field: "modelFile",
            max_bytes: 1024,
            accept: Accept::Extension(".onnx"),
        };
        let ok = multipart(&[Part::File("modelFile", "best.ONNX", "application/octet-stream", b"m")]).await;
        assert!(read_form(ok, &rule).await.unwrap().file.is_some());

        let bad = multipart(&[Part::File("modelFile", "best.pt", "application/octet-stream", b"m")]).await;
        let err = read_form(bad, &rule).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
