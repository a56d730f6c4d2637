use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Recognition pipeline ====
    pub static ref GATE_FRAMES_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "gate_frames_processed_total",
                "Frames pulled from a channel queue and run through the pipeline",
            ),
            &["channel"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref GATE_FRAMES_DROPPED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "gate_frames_dropped_total",
                "Frames dropped because the channel queue was full",
            ),
            &["channel"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref GATE_RECOGNITION_OUTCOMES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "gate_recognition_outcomes_total",
                "Recognition cycle outcomes (match/no_match/error)",
            ),
            &["channel", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref GATE_RECOGNITION_SECONDS: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "gate_recognition_seconds",
                "Wall-clock duration of one full recognition cycle",
            ),
            &["channel"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Backends ====
    pub static ref GATE_OCR_BACKEND_FAILURES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "gate_ocr_backend_failures_total",
                "OCR backend invocations that errored or timed out",
            ),
            &["backend"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Debounce and reporting ====
    pub static ref GATE_DEBOUNCE_SUPPRESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "gate_debounce_suppressed_total",
                "Matches suppressed by the per-channel debounce gate",
            ),
            &["channel"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref GATE_REPORT_FAILURES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "gate_report_failures_total",
                "Ledger report deliveries that failed (never retried)",
            ),
            &["channel"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Render all registered metrics in Prometheus text exposition format.
pub fn gather() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buf) {
        tracing::error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_register_and_increment() {
        GATE_FRAMES_PROCESSED.with_label_values(&["entry"]).inc();
        GATE_DEBOUNCE_SUPPRESSED.with_label_values(&["exit"]).inc();
        assert!(GATE_FRAMES_PROCESSED.with_label_values(&["entry"]).get() >= 1);
    }

    #[test]
    fn test_gather_renders_text_format() {
        GATE_RECOGNITION_OUTCOMES
            .with_label_values(&["entry", "match"])
            .inc();
        let text = gather();
        assert!(text.contains("gate_recognition_outcomes_total"));
    }
}
