//! HTTP client for the plate detection inference service.
//!
//! The service accepts a JPEG frame and answers with raw boxes in pixel
//! coordinates. Clipping, zero-area filtering, the confidence floor and the
//! relaxed-floor retry all live client-side so the service stays stateless.

use async_trait::async_trait;
use common::plates::{BoundingBox, CandidateRegion, Frame};
use common::EngineError;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

use super::{order_candidates, PlateDetector};

const DETECTOR_NAME: &str = "http-detector";

#[derive(Deserialize)]
struct DetectionBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f32,
}

#[derive(Deserialize)]
struct DetectResponse {
    boxes: Vec<DetectionBox>,
}

pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
    confidence_floor: f32,
    /// When set and the floor filters everything out, the same response is
    /// re-filtered once at floor * scale before giving up.
    retry_floor_scale: Option<f32>,
}

impl HttpDetector {
    pub fn new(
        url: String,
        confidence_floor: f32,
        retry_floor_scale: Option<f32>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::unavailable(DETECTOR_NAME, format!("build client: {e}")))?;
        Ok(Self {
            client,
            url,
            confidence_floor,
            retry_floor_scale,
        })
    }

    fn clip_boxes(&self, boxes: &[DetectionBox], frame: &Frame) -> Vec<CandidateRegion> {
        boxes
            .iter()
            .filter_map(|b| {
                let bbox = BoundingBox::clip(
                    b.x1.floor() as i64,
                    b.y1.floor() as i64,
                    b.x2.ceil() as i64,
                    b.y2.ceil() as i64,
                    frame.width(),
                    frame.height(),
                )?;
                Some(CandidateRegion {
                    bbox,
                    detection_confidence: b.confidence.clamp(0.0, 1.0),
                })
            })
            .collect()
    }
}

#[async_trait]
impl PlateDetector for HttpDetector {
    fn name(&self) -> &'static str {
        DETECTOR_NAME
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<CandidateRegion>, EngineError> {
        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(frame.image.clone())
            .write_to(&mut jpeg, ImageFormat::Jpeg)
            .map_err(|e| EngineError::unavailable(DETECTOR_NAME, format!("encode frame: {e}")))?;

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(jpeg.into_inner())
            .send()
            .await
            .map_err(|e| EngineError::unavailable(DETECTOR_NAME, format!("request: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::unavailable(
                DETECTOR_NAME,
                format!("status {}", response.status()),
            ));
        }

        let parsed: DetectResponse = response
            .json()
            .await
            .map_err(|e| EngineError::unavailable(DETECTOR_NAME, format!("parse response: {e}")))?;

        let clipped = self.clip_boxes(&parsed.boxes, frame);
        let mut kept: Vec<CandidateRegion> = clipped
            .iter()
            .filter(|c| c.detection_confidence >= self.confidence_floor)
            .cloned()
            .collect();

        if kept.is_empty() {
            if let Some(scale) = self.retry_floor_scale {
                let relaxed = self.confidence_floor * scale;
                kept = clipped
                    .iter()
                    .filter(|c| c.detection_confidence >= relaxed)
                    .cloned()
                    .collect();
                if !kept.is_empty() {
                    debug!(
                        channel = %frame.channel_id,
                        relaxed_floor = relaxed,
                        candidates = kept.len(),
                        "detector floor relaxed"
                    );
                }
            }
        }

        order_candidates(&mut kept);
        debug!(
            channel = %frame.channel_id,
            raw = parsed.boxes.len(),
            kept = kept.len(),
            "detector response processed"
        );
        Ok(kept)
    }
}
