//! Delivery of admitted plate events to the parking ledger service.

use async_trait::async_trait;
use base64::Engine as _;
use common::plates::{Frame, PlateEvent};
use common::EngineError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::time::Duration;
use tracing::info;

/// Sink for admitted plate events. Delivery failures are reported, never
/// allowed to stall the capture loop.
#[async_trait]
pub trait LedgerReporter: Send + Sync {
    async fn report(&self, event: &PlateEvent) -> Result<(), EngineError>;
}

/// POSTs events to `{base}/anpr/result` with bearer authentication.
pub struct HttpLedgerReporter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpLedgerReporter {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::unavailable("ledger", format!("build client: {e}")))?;
        let endpoint = format!("{}/anpr/result", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }
}

#[async_trait]
impl LedgerReporter for HttpLedgerReporter {
    async fn report(&self, event: &PlateEvent) -> Result<(), EngineError> {
        let mut request = self.client.post(&self.endpoint).json(event);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::unavailable("ledger", format!("request: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::unavailable(
                "ledger",
                format!("status {}", response.status()),
            ));
        }

        info!(
            channel = %event.channel_id,
            plate = %event.plate,
            "plate event delivered to ledger"
        );
        Ok(())
    }
}

/// Logs events instead of delivering them; used when no ledger is configured.
pub struct LogReporter;

#[async_trait]
impl LedgerReporter for LogReporter {
    async fn report(&self, event: &PlateEvent) -> Result<(), EngineError> {
        info!(
            channel = %event.channel_id,
            plate = %event.plate,
            timestamp_ms = event.timestamp_ms,
            "plate event (no ledger configured)"
        );
        Ok(())
    }
}

/// Build the ledger payload for an admitted recognition, attaching the
/// source frame as base64 JPEG evidence.
pub fn build_event(frame: &Frame, plate: String) -> PlateEvent {
    let image_base64 = encode_jpeg(frame)
        .map(|jpeg| base64::engine::general_purpose::STANDARD.encode(jpeg));
    PlateEvent {
        plate,
        channel_id: frame.channel_id.clone(),
        timestamp_ms: frame.timestamp_ms,
        image_base64,
    }
}

fn encode_jpeg(frame: &Frame) -> Option<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(frame.image.clone())
        .write_to(&mut buf, ImageFormat::Jpeg)
        .ok()?;
    Some(buf.into_inner())
}
