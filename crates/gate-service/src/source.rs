//! Frame acquisition from gate cameras.

use async_trait::async_trait;
use common::plates::Frame;
use common::EngineError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Produces one decoded frame per call for a single channel.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn next_frame(&self) -> Result<Frame, EngineError>;
}

/// Polls a camera snapshot endpoint that serves one JPEG per request.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    channel_id: String,
    url: String,
    sequence: AtomicU64,
}

impl HttpSnapshotSource {
    pub fn new(channel_id: String, url: String, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::unavailable("snapshot", format!("build client: {e}")))?;
        Ok(Self {
            client,
            channel_id,
            url,
            sequence: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl FrameSource for HttpSnapshotSource {
    async fn next_frame(&self) -> Result<Frame, EngineError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::unavailable("snapshot", format!("request: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::unavailable(
                "snapshot",
                format!("status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::unavailable("snapshot", format!("read body: {e}")))?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        Frame::decode(self.channel_id.clone(), sequence, common::now_ms(), &bytes)
    }
}
