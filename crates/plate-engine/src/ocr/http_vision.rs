//! Hosted vision OCR backend reached over HTTP.
//!
//! The service accepts a base64 PNG and answers with the recognized text and
//! an optional confidence. It is the most accurate backend in the chain and
//! therefore tried first.

use async_trait::async_trait;
use base64::Engine as _;
use common::plates::ProcessedImage;
use common::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{png_bytes, OcrBackend};

const BACKEND_NAME: &str = "http-vision";

/// Confidence assumed when the service returns text without a score.
const DEFAULT_CONFIDENCE: f32 = 0.9;

#[derive(Serialize)]
struct VisionRequest {
    image_base64: String,
}

#[derive(Deserialize)]
struct VisionResponse {
    text: Option<String>,
    confidence: Option<f32>,
}

pub struct HttpVisionBackend {
    client: reqwest::Client,
    url: String,
}

impl HttpVisionBackend {
    pub fn new(url: String, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::unavailable(BACKEND_NAME, format!("build client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl OcrBackend for HttpVisionBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn recognize(
        &self,
        image: &ProcessedImage,
    ) -> Result<Option<(String, f32)>, EngineError> {
        let png = png_bytes(&image.image, BACKEND_NAME)?;
        let body = VisionRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(png),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::unavailable(BACKEND_NAME, format!("request: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::unavailable(
                BACKEND_NAME,
                format!("status {}", response.status()),
            ));
        }

        let parsed: VisionResponse = response
            .json()
            .await
            .map_err(|e| EngineError::unavailable(BACKEND_NAME, format!("parse response: {e}")))?;

        let Some(text) = parsed.text else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        let confidence = parsed.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        debug!(variant = image.name, confidence, "vision ocr produced text");
        Ok(Some((text, confidence)))
    }
}
