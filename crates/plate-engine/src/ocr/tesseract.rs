//! Local Tesseract backend invoked as a child process.
//!
//! Acts as the offline fallback when the hosted service is unreachable. The
//! binary is fed a PNG on stdin and prints recognized text on stdout; it
//! reports no per-call confidence, so a fixed assumed confidence is used.

use async_trait::async_trait;
use common::plates::ProcessedImage;
use common::EngineError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{png_bytes, OcrBackend};

const BACKEND_NAME: &str = "tesseract";

/// Tesseract does not emit a usable confidence in plain-text mode.
const ASSUMED_CONFIDENCE: f32 = 0.6;

/// Plates only ever contain uppercase letters and digits.
const CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct TesseractBackend {
    bin: String,
}

impl TesseractBackend {
    /// `bin` is the tesseract executable, usually just "tesseract".
    pub fn new(bin: String) -> Self {
        Self { bin }
    }
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn recognize(
        &self,
        image: &ProcessedImage,
    ) -> Result<Option<(String, f32)>, EngineError> {
        let png = png_bytes(&image.image, BACKEND_NAME)?;

        // --psm 7: treat the crop as a single text line
        let mut child = Command::new(&self.bin)
            .args(["stdin", "stdout", "--psm", "7", "-c"])
            .arg(format!("tessedit_char_whitelist={CHAR_WHITELIST}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::unavailable(BACKEND_NAME, format!("spawn {}: {e}", self.bin)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::unavailable(BACKEND_NAME, "stdin not piped"))?;
        stdin
            .write_all(&png)
            .await
            .map_err(|e| EngineError::unavailable(BACKEND_NAME, format!("write image: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EngineError::unavailable(BACKEND_NAME, format!("wait: {e}")))?;
        if !output.status.success() {
            return Err(EngineError::unavailable(
                BACKEND_NAME,
                format!("exit status {}", output.status),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        debug!(variant = image.name, "tesseract produced text");
        Ok(Some((text, ASSUMED_CONFIDENCE)))
    }
}
