//! The capture loop must report a lingering vehicle once, not once per frame.

use async_trait::async_trait;
use common::plates::{CandidateRegion, Frame, PlateEvent, ProcessedImage};
use common::EngineError;
use gate_service::channel::spawn_channel;
use gate_service::reporter::LedgerReporter;
use gate_service::source::FrameSource;
use image::{Rgb, RgbImage};
use plate_engine::arbiter::{Arbiter, ArbiterConfig};
use plate_engine::debounce::DebounceGate;
use plate_engine::detector::PlateDetector;
use plate_engine::normalize::NormalizeRules;
use plate_engine::ocr::{OcrBackend, OcrChain};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct RepeatingSource;

#[async_trait]
impl FrameSource for RepeatingSource {
    async fn next_frame(&self) -> Result<Frame, EngineError> {
        Ok(Frame {
            channel_id: "entry".to_string(),
            sequence: 0,
            timestamp_ms: 0,
            image: RgbImage::from_pixel(640, 480, Rgb([100, 100, 100])),
        })
    }
}

struct FullFrameDetector;

#[async_trait]
impl PlateDetector for FullFrameDetector {
    fn name(&self) -> &'static str {
        "full-frame"
    }

    async fn detect(&self, frame: &Frame) -> Result<Vec<CandidateRegion>, EngineError> {
        Ok(vec![CandidateRegion {
            bbox: common::plates::BoundingBox {
                x1: 0,
                y1: 0,
                x2: frame.width(),
                y2: frame.height(),
            },
            detection_confidence: 1.0,
        }])
    }
}

struct ConstantOcr;

#[async_trait]
impl OcrBackend for ConstantOcr {
    fn name(&self) -> &'static str {
        "constant"
    }

    async fn recognize(
        &self,
        _image: &ProcessedImage,
    ) -> Result<Option<(String, f32)>, EngineError> {
        Ok(Some(("B1387DKC".to_string(), 0.9)))
    }
}

struct CollectingReporter {
    events: Mutex<Vec<PlateEvent>>,
}

#[async_trait]
impl LedgerReporter for CollectingReporter {
    async fn report(&self, event: &PlateEvent) -> Result<(), EngineError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_lingering_vehicle_reported_once_within_cooldown() {
    let arbiter = Arc::new(Arbiter::new(
        Box::new(FullFrameDetector),
        OcrChain::new(vec![Box::new(ConstantOcr)], 0.0, Duration::from_secs(5)),
        NormalizeRules::default(),
        ArbiterConfig {
            early_exit_ceiling: Some(8.0),
            ..ArbiterConfig::default()
        },
    ));
    let reporter = Arc::new(CollectingReporter {
        events: Mutex::new(Vec::new()),
    });
    // Cooldown far longer than the test run
    let debounce = Arc::new(DebounceGate::new(Duration::from_secs(60)));
    let shutdown = CancellationToken::new();

    let handles = spawn_channel(
        "entry".to_string(),
        Arc::new(RepeatingSource),
        arbiter,
        debounce,
        reporter.clone(),
        Duration::from_millis(20),
        shutdown.clone(),
    );

    // Long enough for many capture cycles
    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();
    let _ = handles.producer.await;
    let _ = handles.worker.await;

    let events = reporter.events.lock().unwrap();
    assert_eq!(events.len(), 1, "same plate must be reported exactly once");
    assert_eq!(events[0].plate, "B 1387 DKC");
}
