use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{error, info, warn};
use url::Url;

use super::types::{RawDetection, RawResponse, ServiceHealth};
use super::InferenceError;

/// Longest service error body echoed back into an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    detect_url: Url,
    health_url: Url,
    timeout_secs: u64,
}

impl InferenceClient {
    /// `base` must end with a slash so endpoint names are appended to its path.
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Transport(format!("failed to build HTTP client: {}", e)))?;
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| InferenceError::Transport(format!("bad service URL: {}", e)))
        };

        Ok(Self {
            http,
            detect_url: join("detect")?,
            health_url: join("health")?,
            timeout_secs: timeout.as_secs(),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout(self.timeout_secs)
        } else {
            InferenceError::Transport(err.to_string())
        }
    }

    /// Send one image for detection and return the service's result payload.
    pub async fn detect(
        &self,
        image: Vec<u8>,
        file_name: &str,
        mime: &str,
        confidence_threshold: f64,
    ) -> Result<RawDetection, InferenceError> {
        let size = image.len();
        let part = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| InferenceError::Transport(format!("invalid image MIME '{}': {}", mime, e)))?;
        let form = Form::new()
            .part("image", part)
            .text("confidence_threshold", confidence_threshold.to_string());

        info!(
            "Sending {} bytes to detection service (threshold {})",
            size, confidence_threshold
        );
        let response = self
            .http
            .post(self.detect_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let err = self.request_error(e);
                error!("Detection request failed: {}", err);
                err
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        let parsed = serde_json::from_slice::<RawResponse>(&body);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|raw| raw.failure_message())
                .unwrap_or_else(|| {
                    let text = String::from_utf8_lossy(&body);
                    text.chars().take(MAX_ERROR_BODY).collect()
                });
            warn!("Detection service answered {}: {}", status, message);
            return Err(InferenceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let raw = parsed.map_err(|e| InferenceError::Malformed(e.to_string()))?;
        if raw.success == Some(false) {
            let message = raw
                .failure_message()
                .unwrap_or_else(|| "detection failed".to_string());
            warn!("Detection service reported failure: {}", message);
            return Err(InferenceError::Service(message));
        }

        let data = raw.data.unwrap_or_default();
        info!("Detection service returned {} raw defects", data.defects.len());
        Ok(data)
    }

    /// Probe the service's health endpoint.
    pub async fn health(&self) -> Result<ServiceHealth, InferenceError> {
        let response = self
            .http
            .get(self.health_url.clone())
            .timeout(Duration::from_secs(self.timeout_secs.clamp(1, 5)))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unhealthy").to_string(),
            });
        }

        response
            .json::<ServiceHealth>()
            .await
            .map_err(|e| InferenceError::Malformed(e.to_string()))
    }
}
