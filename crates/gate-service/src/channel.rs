//! Per-channel capture and recognition tasks.
//!
//! Each channel runs a producer polling the camera and a worker draining a
//! bounded queue. Recognition is slower than capture, so the queue holds at
//! most two frames and newer frames are dropped while it is full; a stale
//! backlog is worse than a missed frame at a gate.

use common::plates::{Frame, RecognitionResult};
use plate_engine::{Arbiter, DebounceGate};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::reporter::{build_event, LedgerReporter};
use crate::source::FrameSource;

/// At most one frame in flight and one queued behind it.
pub const FRAME_QUEUE_DEPTH: usize = 2;

pub struct ChannelHandles {
    pub producer: JoinHandle<()>,
    pub worker: JoinHandle<()>,
}

/// Start the producer/worker pair for one channel.
pub fn spawn_channel(
    channel_id: String,
    source: Arc<dyn FrameSource>,
    arbiter: Arc<Arbiter>,
    debounce: Arc<DebounceGate>,
    reporter: Arc<dyn LedgerReporter>,
    capture_interval: Duration,
    shutdown: CancellationToken,
) -> ChannelHandles {
    let (tx, rx) = mpsc::channel::<Frame>(FRAME_QUEUE_DEPTH);

    let producer = tokio::spawn(run_producer(
        channel_id.clone(),
        source,
        tx,
        capture_interval,
        shutdown.clone(),
    ));
    let worker = tokio::spawn(run_worker(
        channel_id,
        rx,
        arbiter,
        debounce,
        reporter,
        shutdown,
    ));

    ChannelHandles { producer, worker }
}

async fn run_producer(
    channel_id: String,
    source: Arc<dyn FrameSource>,
    tx: mpsc::Sender<Frame>,
    capture_interval: Duration,
    shutdown: CancellationToken,
) {
    info!(channel = %channel_id, "capture producer started");
    let mut interval = tokio::time::interval(capture_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let frame = match source.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "frame capture failed");
                continue;
            }
        };

        match tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::GATE_FRAMES_DROPPED
                    .with_label_values(&[&channel_id])
                    .inc();
                debug!(channel = %channel_id, "queue full, frame dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
    info!(channel = %channel_id, "capture producer stopped");
}

async fn run_worker(
    channel_id: String,
    mut rx: mpsc::Receiver<Frame>,
    arbiter: Arc<Arbiter>,
    debounce: Arc<DebounceGate>,
    reporter: Arc<dyn LedgerReporter>,
    shutdown: CancellationToken,
) {
    info!(channel = %channel_id, "recognition worker started");
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let timer = metrics::GATE_RECOGNITION_SECONDS
            .with_label_values(&[&channel_id])
            .start_timer();
        let result = arbiter.select(&frame).await;
        timer.observe_duration();

        metrics::GATE_FRAMES_PROCESSED
            .with_label_values(&[&channel_id])
            .inc();

        match result {
            Ok(RecognitionResult::Match { plate, .. }) => {
                metrics::GATE_RECOGNITION_OUTCOMES
                    .with_label_values(&[&channel_id, "match"])
                    .inc();

                if !debounce.admit(&channel_id, &plate) {
                    metrics::GATE_DEBOUNCE_SUPPRESSED
                        .with_label_values(&[&channel_id])
                        .inc();
                    continue;
                }

                let event = build_event(&frame, plate);
                if let Err(e) = reporter.report(&event).await {
                    metrics::GATE_REPORT_FAILURES
                        .with_label_values(&[&channel_id])
                        .inc();
                    error!(channel = %channel_id, error = %e, "ledger delivery failed");
                }
            }
            Ok(RecognitionResult::NoMatch { attempted }) => {
                metrics::GATE_RECOGNITION_OUTCOMES
                    .with_label_values(&[&channel_id, "no_match"])
                    .inc();
                if !attempted.is_empty() {
                    debug!(
                        channel = %channel_id,
                        attempts = attempted.len(),
                        "frame produced text but no accepted plate"
                    );
                }
            }
            Err(e) => {
                metrics::GATE_RECOGNITION_OUTCOMES
                    .with_label_values(&[&channel_id, "error"])
                    .inc();
                warn!(channel = %channel_id, error = %e, "recognition cycle failed");
            }
        }
    }
    info!(channel = %channel_id, "recognition worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::plates::{PlateEvent, ProcessedImage};
    use common::EngineError;
    use image::{Rgb, RgbImage};
    use plate_engine::arbiter::ArbiterConfig;
    use plate_engine::detector::PlateDetector;
    use plate_engine::normalize::NormalizeRules;
    use plate_engine::ocr::{OcrBackend, OcrChain};
    use std::sync::Mutex;

    struct OneFrameSource {
        served: Mutex<bool>,
    }

    #[async_trait]
    impl FrameSource for OneFrameSource {
        async fn next_frame(&self) -> Result<Frame, EngineError> {
            let mut served = self.served.lock().unwrap();
            if *served {
                return Err(EngineError::unavailable("test", "exhausted"));
            }
            *served = true;
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

        async fn detect(
            &self,
            frame: &Frame,
        ) -> Result<Vec<common::plates::CandidateRegion>, EngineError> {
            Ok(vec![common::plates::CandidateRegion {
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

    struct PlateOcr;

    #[async_trait]
    impl OcrBackend for PlateOcr {
        fn name(&self) -> &'static str {
            "plate"
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
    async fn test_channel_reports_recognized_plate_once() {
        let arbiter = Arc::new(Arbiter::new(
            Box::new(FullFrameDetector),
            OcrChain::new(vec![Box::new(PlateOcr)], 0.0, Duration::from_secs(5)),
            NormalizeRules::default(),
            ArbiterConfig {
                early_exit_ceiling: Some(8.0),
                ..ArbiterConfig::default()
            },
        ));
        let reporter = Arc::new(CollectingReporter {
            events: Mutex::new(Vec::new()),
        });
        let shutdown = CancellationToken::new();

        let handles = spawn_channel(
            "entry".to_string(),
            Arc::new(OneFrameSource {
                served: Mutex::new(false),
            }),
            arbiter,
            Arc::new(DebounceGate::default()),
            reporter.clone(),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
        let _ = handles.producer.await;
        let _ = handles.worker.await;

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].plate, "B 1387 DKC");
        assert_eq!(events[0].channel_id, "entry");
    }
}
