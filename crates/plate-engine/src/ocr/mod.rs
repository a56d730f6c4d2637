//! OCR backend boundary and the fallback chain.
//!
//! Backends differ in cost, availability and accuracy, so they are tried in
//! a fixed priority order (most accurate first, cheapest last). A backend
//! that errors, times out or declines is treated as "no result" and the
//! chain moves on; no backend failure ever crosses this boundary.

pub mod http_vision;
pub mod tesseract;

use async_trait::async_trait;
use common::plates::{OcrHypothesis, ProcessedImage};
use common::EngineError;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

pub use http_vision::HttpVisionBackend;
pub use tesseract::TesseractBackend;

/// One interchangeable text-recognition backend.
///
/// `Ok(None)` is an explicit "no text" signal; `Err` means the backend could
/// not be invoked at all. Implementations must not panic.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recognize(
        &self,
        image: &ProcessedImage,
    ) -> Result<Option<(String, f32)>, EngineError>;
}

/// Outcome of one chain pass over a single processed image.
#[derive(Debug, Default)]
pub struct ChainOutcome {
    /// First hypothesis accepted at/above the confidence floor, if any
    pub accepted: Option<OcrHypothesis>,

    /// Every raw text any backend produced, including rejected ones; kept
    /// for NoMatch diagnostics
    pub attempted: Vec<String>,
}

/// Ordered list of OCR backends with per-call fault isolation.
pub struct OcrChain {
    backends: Vec<Box<dyn OcrBackend>>,
    min_confidence: f32,
    call_timeout: Duration,
}

impl OcrChain {
    /// `min_confidence` defaults to 0.0 upstream, i.e. any non-empty text is
    /// accepted. `call_timeout` bounds each backend invocation; a timed-out
    /// call is treated identically to a failed one.
    pub fn new(
        backends: Vec<Box<dyn OcrBackend>>,
        min_confidence: f32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            min_confidence,
            call_timeout,
        }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Run backends in priority order, returning the first non-empty text
    /// at or above the confidence floor.
    pub async fn recognize(&self, image: &ProcessedImage) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();

        for backend in &self.backends {
            let result = tokio::time::timeout(self.call_timeout, backend.recognize(image)).await;
            let (text, confidence) = match result {
                Err(_) => {
                    warn!(
                        backend = backend.name(),
                        timeout_secs = self.call_timeout.as_secs(),
                        "ocr backend timed out"
                    );
                    telemetry::metrics::GATE_OCR_BACKEND_FAILURES
                        .with_label_values(&[backend.name()])
                        .inc();
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(backend = backend.name(), error = %e, "ocr backend failed");
                    telemetry::metrics::GATE_OCR_BACKEND_FAILURES
                        .with_label_values(&[backend.name()])
                        .inc();
                    continue;
                }
                Ok(Ok(None)) => continue,
                Ok(Ok(Some(pair))) => pair,
            };

            let text = text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            outcome.attempted.push(text.clone());

            if confidence >= self.min_confidence {
                debug!(
                    backend = backend.name(),
                    variant = image.name,
                    confidence,
                    "ocr hypothesis accepted"
                );
                outcome.accepted = Some(OcrHypothesis {
                    raw_text: text,
                    ocr_confidence: confidence.clamp(0.0, 1.0),
                    backend_name: backend.name().to_string(),
                    preprocessing: image.name.to_string(),
                });
                break;
            }
            debug!(
                backend = backend.name(),
                confidence,
                floor = self.min_confidence,
                "ocr hypothesis below confidence floor"
            );
        }

        outcome
    }
}

/// Encode a processed image as PNG for transport to a backend.
pub(crate) fn png_bytes(image: &DynamicImage, backend: &str) -> Result<Vec<u8>, EngineError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| EngineError::unavailable(backend, format!("encode image: {e}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_image() -> ProcessedImage {
        ProcessedImage {
            name: "original",
            image: DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
        }
    }

    struct FixedBackend {
        name: &'static str,
        reply: Option<(String, f32)>,
        calls: AtomicUsize,
    }

    impl FixedBackend {
        fn some(name: &'static str, text: &str, conf: f32) -> Self {
            Self {
                name,
                reply: Some((text.to_string(), conf)),
                calls: AtomicUsize::new(0),
            }
        }

        fn none(name: &'static str) -> Self {
            Self {
                name,
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OcrBackend for FixedBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn recognize(
            &self,
            _image: &ProcessedImage,
        ) -> Result<Option<(String, f32)>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl OcrBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn recognize(
            &self,
            _image: &ProcessedImage,
        ) -> Result<Option<(String, f32)>, EngineError> {
            Err(EngineError::unavailable("failing", "service down"))
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl OcrBackend for HangingBackend {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn recognize(
            &self,
            _image: &ProcessedImage,
        ) -> Result<Option<(String, f32)>, EngineError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_first_nonempty_text_wins() {
        let chain = OcrChain::new(
            vec![
                Box::new(FixedBackend::none("declines")),
                Box::new(FixedBackend::some("first", "B 1387 DKC", 0.9)),
                Box::new(FixedBackend::some("second", "WRONG", 0.99)),
            ],
            0.0,
            Duration::from_secs(5),
        );

        let outcome = chain.recognize(&test_image()).await;
        let hyp = outcome.accepted.unwrap();
        assert_eq!(hyp.raw_text, "B 1387 DKC");
        assert_eq!(hyp.backend_name, "first");
        assert_eq!(outcome.attempted, vec!["B 1387 DKC"]);
    }

    #[tokio::test]
    async fn test_fault_isolation_matches_single_backend_behavior() {
        let chain = OcrChain::new(
            vec![
                Box::new(FailingBackend),
                Box::new(FailingBackend),
                Box::new(FixedBackend::some("last", "D 45 XY", 0.7)),
            ],
            0.0,
            Duration::from_secs(5),
        );
        let with_failures = chain.recognize(&test_image()).await;

        let alone = OcrChain::new(
            vec![Box::new(FixedBackend::some("last", "D 45 XY", 0.7))],
            0.0,
            Duration::from_secs(5),
        );
        let baseline = alone.recognize(&test_image()).await;

        let a = with_failures.accepted.unwrap();
        let b = baseline.accepted.unwrap();
        assert_eq!(a.raw_text, b.raw_text);
        assert_eq!(a.ocr_confidence, b.ocr_confidence);
        assert_eq!(a.backend_name, b.backend_name);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through() {
        let chain = OcrChain::new(
            vec![
                Box::new(HangingBackend),
                Box::new(FixedBackend::some("fallback", "F 1 A", 0.5)),
            ],
            0.0,
            Duration::from_secs(2),
        );

        let outcome = chain.recognize(&test_image()).await;
        assert_eq!(outcome.accepted.unwrap().backend_name, "fallback");
    }

    #[tokio::test]
    async fn test_below_floor_recorded_but_not_accepted() {
        let chain = OcrChain::new(
            vec![
                Box::new(FixedBackend::some("noisy", "8I387", 0.2)),
                Box::new(FixedBackend::some("good", "B1387DKC", 0.8)),
            ],
            0.5,
            Duration::from_secs(5),
        );

        let outcome = chain.recognize(&test_image()).await;
        assert_eq!(outcome.accepted.as_ref().unwrap().backend_name, "good");
        assert_eq!(outcome.attempted, vec!["8I387", "B1387DKC"]);
    }

    #[tokio::test]
    async fn test_whitespace_only_text_is_no_result() {
        let chain = OcrChain::new(
            vec![Box::new(FixedBackend::some("blank", "   \n", 0.9))],
            0.0,
            Duration::from_secs(5),
        );

        let outcome = chain.recognize(&test_image()).await;
        assert!(outcome.accepted.is_none());
        assert!(outcome.attempted.is_empty());
    }
}
